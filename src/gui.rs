use std::path::{Path, PathBuf};

use eframe::egui;
use egui::Color32;
use egui_file_dialog::FileDialog;
use egui_plot::{Legend, Line, Plot, PlotPoints, Points};
use rand::Rng;
use strum::IntoEnumIterator;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use timebin::io::save_text;
use timebin::palette::{self, Rgba};
use timebin::{BinnedResult, Binner, ColormapName, ResizeOptions, Sample, SampleFile};

const RAW_ALPHA: u8 = 60;
const MIN_RADIUS: f64 = 3.0;
const MAX_RADIUS: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogPurpose {
    Open,
    Save,
}

struct Dataset {
    name: String,
    samples: Vec<Sample>,
    binned: Vec<BinnedResult>,
    visible: bool,
}

struct BinSettings {
    width: f64,
    start: f64,
    use_start: bool,
    show_raw: bool,
}

struct MyApp {
    filedialog: FileDialog,
    dialog_purpose: DialogPurpose,
    datasets: Vec<Dataset>,
    selected: usize,
    settings: BinSettings,
    colormap: ColormapName,
    last_error: String,
}

impl Default for MyApp {
    fn default() -> Self {
        Self {
            filedialog: FileDialog::new(),
            dialog_purpose: DialogPurpose::Open,
            datasets: vec![],
            selected: 0,
            settings: BinSettings {
                width: 1.0,
                start: 0.0,
                use_start: false,
                show_raw: true,
            },
            colormap: ColormapName::default(),
            last_error: "".to_string(),
        }
    }
}

impl MyApp {
    fn binner(&self) -> timebin::Result<Binner> {
        let start = self.settings.use_start.then_some(self.settings.start);
        Binner::new(self.settings.width, start)
    }

    fn rebin_all(&mut self) {
        self.last_error.clear();
        let binner = match self.binner() {
            Ok(b) => b,
            Err(e) => {
                self.last_error = e.to_string();
                return;
            }
        };
        for dataset in &mut self.datasets {
            match binner.bin(dataset.samples.clone()) {
                Ok(binned) => dataset.binned = binned,
                Err(e) => {
                    dataset.binned.clear();
                    self.last_error = format!("{}: {}", dataset.name, e);
                }
            }
        }
    }

    fn add_dataset(&mut self, name: String, samples: Vec<Sample>) {
        info!("added dataset {} with {} samples", name, samples.len());
        self.datasets.push(Dataset {
            name,
            samples,
            binned: vec![],
            visible: true,
        });
        self.selected = self.datasets.len() - 1;
        self.rebin_all();
    }

    fn open(&mut self, path: &Path) {
        match SampleFile::new(path).and_then(|file| file.load()) {
            Ok(samples) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                self.add_dataset(name, samples);
            }
            Err(e) => {
                warn!("failed to load {}: {}", path.display(), e);
                self.last_error = format!("{}: {}", path.display(), e);
            }
        }
    }

    fn save(&mut self, path: &Path) {
        let Some(dataset) = self.datasets.get(self.selected) else {
            self.last_error = "No dataset selected".to_string();
            return;
        };
        match save_text(path, &dataset.binned) {
            Ok(()) => info!("saved {} bins to {}", dataset.binned.len(), path.display()),
            Err(e) => self.last_error = format!("{}: {}", path.display(), e),
        }
    }

    fn colours(&self) -> Vec<Color32> {
        // a palette needs two colours even when only one dataset is shown
        let count = self.datasets.len().max(2);
        palette::generate_with(count, &self.colormap)
            .map(|colours| colours.into_iter().map(|c| to_color32(c, 255)).collect())
            .unwrap_or_else(|_| vec![Color32::LIGHT_BLUE; count])
    }
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("timebin");

            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Open file").clicked() {
                    self.dialog_purpose = DialogPurpose::Open;
                    self.filedialog.select_file();
                }
                if ui.button("Demo data").clicked() {
                    let name = format!("demo {}", self.datasets.len() + 1);
                    self.add_dataset(name, demo_samples(400));
                }
                if ui
                    .add_enabled(!self.datasets.is_empty(), egui::Button::new("Save binned"))
                    .clicked()
                {
                    self.dialog_purpose = DialogPurpose::Save;
                    self.filedialog.save_file();
                }
            });

            // Update the dialog
            self.filedialog.update(ctx);

            if let Some(path) = self.filedialog.selected() {
                let path: PathBuf = path.to_path_buf();
                self.filedialog = FileDialog::new();
                match self.dialog_purpose {
                    DialogPurpose::Open => self.open(&path),
                    DialogPurpose::Save => self.save(&path),
                }
            }

            ui.separator();

            let mut changed = false;
            ui.horizontal(|ui| {
                ui.label("Bin width: ");
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut self.settings.width)
                            .speed(0.01)
                            .clamp_range(1e-9..=f64::MAX),
                    )
                    .changed();
                changed |= ui
                    .checkbox(&mut self.settings.use_start, "First bin starts at")
                    .changed();
                changed |= ui
                    .add_enabled(
                        self.settings.use_start,
                        egui::DragValue::new(&mut self.settings.start).speed(0.01),
                    )
                    .changed();
                ui.checkbox(&mut self.settings.show_raw, "Show raw samples");
            });
            if changed {
                self.rebin_all();
            }

            egui::ComboBox::from_label("Colormap")
                .selected_text(self.colormap.to_string())
                .show_ui(ui, |ui| {
                    for name in ColormapName::iter() {
                        ui.selectable_value(&mut self.colormap, name, name.to_string());
                    }
                });

            ui.horizontal(|ui| {
                for (i, dataset) in self.datasets.iter_mut().enumerate() {
                    ui.selectable_value(&mut self.selected, i, dataset.name.as_str());
                    ui.checkbox(&mut dataset.visible, "");
                }
            });

            if !self.last_error.is_empty() {
                ui.colored_label(Color32::RED, self.last_error.as_str());
            }

            ui.separator();

            draw_datasets(ui, &self.datasets, &self.colours(), self.settings.show_raw);
        });
    }
}

fn draw_datasets(ui: &mut egui::Ui, datasets: &[Dataset], colours: &[Color32], show_raw: bool) {
    Plot::new("binned")
        .height(500.0)
        .legend(Legend::default())
        .x_axis_label("x")
        .y_axis_label("y")
        .show(ui, |plot_ui| {
            for (dataset, &colour) in datasets.iter().zip(colours).filter(|(d, _)| d.visible) {
                if show_raw {
                    let faded = fade(colour, RAW_ALPHA);
                    for s in &dataset.samples {
                        plot_ui.line(Line::new(error_bar(s.x, s.y, s.y_error)).color(faded));
                    }
                    let raw: Vec<[f64; 2]> = dataset.samples.iter().map(|s| [s.x, s.y]).collect();
                    plot_ui.points(Points::new(raw).radius(1.5).color(faded));
                }

                for b in &dataset.binned {
                    plot_ui.line(Line::new(error_bar(b.t, b.y, b.y_err)).color(colour).width(2.0));
                }
                for (b, radius) in dataset.binned.iter().zip(marker_radii(&dataset.binned)) {
                    plot_ui.points(
                        Points::new(vec![[b.t, b.y]])
                            .radius(radius)
                            .color(colour)
                            .name(dataset.name.as_str()),
                    );
                }
            }
        });
}

/// Vertical segment from `y - err` to `y + err` at `x`.
fn error_bar(x: f64, y: f64, err: f64) -> PlotPoints {
    PlotPoints::from(vec![[x, y - err.abs()], [x, y + err.abs()]])
}

/// Marker radius per bin, growing with the number of samples in the bin.
fn marker_radii(binned: &[BinnedResult]) -> Vec<f32> {
    let counts: Vec<f64> = binned.iter().map(|b| b.samples as f64).collect();
    let options = ResizeOptions {
        out_min: MIN_RADIUS,
        out_max: MAX_RADIUS,
        ..Default::default()
    };
    match timebin::resize(&counts, &options) {
        Ok(radii) => radii.into_iter().map(|r| r as f32).collect(),
        // every bin equally populated
        Err(_) => vec![((MIN_RADIUS + MAX_RADIUS) / 2.0) as f32; binned.len()],
    }
}

fn to_color32(colour: Rgba, alpha: u8) -> Color32 {
    let [r, g, b, _] = colour.to_rgba8();
    Color32::from_rgba_unmultiplied(r, g, b, alpha)
}

fn fade(colour: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(colour.r(), colour.g(), colour.b(), alpha)
}

/// Irregularly sampled noisy sine wave.
fn demo_samples(n: usize) -> Vec<Sample> {
    let mut rng = rand::thread_rng();
    let mut x: f64 = 0.0;
    (0..n)
        .map(|_| {
            x += rng.gen_range(0.01..0.1);
            let err: f64 = rng.gen_range(0.05..0.3);
            let y = x.sin() + rng.gen_range(-err..err);
            Sample::new(x, y, err)
        })
        .collect()
}

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "timebin",
        options,
        Box::new(|_| Box::new(MyApp::default())),
    )
}
