//! The egui application embedding the map.
//!
//! Layer layout inside the map's collection is fixed at startup: all
//! basemaps first (only the active one visible), then the imagery
//! reference overlay (hidden until the imagery basemap is selected), then
//! one feature layer per overlay entry. Switching basemaps only toggles
//! visibility; nothing is rebuilt and in-flight tile requests are left
//! alone, so rapid toggling is harmless.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use galileo::render::text::text_service::TextService;
use galileo::render::text::RustybuzzRasterizer;
use galileo::{Map, MapBuilder, MapView};
use galileo_egui::{EguiMap, EguiMapState};
use galileo_types::cartesian::Rect;
use log::{error, info};
use northpark_map::basemap::build_tile_layer;
use northpark_map::config::MapConfig;
use northpark_map::contrast::ContrastCoordinator;
use northpark_map::features::{FeatureService, PlanAreaFeature};
use northpark_map::labels::LabelOverrides;
use northpark_map::overlay::{z_level_for_resolution, OverlayController, OverlayRegistry};
use northpark_map::PlanMapError;

/// Messages from the background load tasks to the UI loop.
enum LoadEvent {
    /// Features for one overlay arrived. The vector is empty when the
    /// query failed; the overlay then simply renders empty.
    Features {
        /// Overlay identifier the features belong to.
        id: String,
        /// The parsed features.
        features: Vec<PlanAreaFeature>,
    },
    /// The label-override table finished loading (`None` on failure).
    Overrides(Option<LabelOverrides>),
}

/// Builds the map and runs the application window. Blocks until the
/// window is closed.
pub fn run(config: MapConfig) -> Result<(), PlanMapError> {
    initialize_font_service();

    let runtime = tokio::runtime::Runtime::new()?;

    let mut registry = OverlayRegistry::new();
    for entry in &config.overlays {
        registry.register(OverlayController::new(entry.clone()));
    }

    let map = build_map(&config, &registry)?;

    let (events_tx, events) = mpsc::channel();
    let pending = spawn_loaders(&runtime, &config, events_tx);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_title(config.title.clone()),
        ..Default::default()
    };

    galileo_egui::InitBuilder::new(map)
        .with_native_options(native_options)
        .with_app_builder(move |map_state| {
            Box::new(PlanMapApp::new(
                map_state, config, registry, events, pending, runtime,
            ))
        })
        .init()
        .map_err(|err| PlanMapError::Init(err.to_string()))
}

fn initialize_font_service() {
    let font_dir =
        std::env::var("NORTHPARK_FONTS").unwrap_or_else(|_| "/usr/share/fonts".to_string());
    let rasterizer = RustybuzzRasterizer::default();
    TextService::initialize(rasterizer).load_fonts(&font_dir);
}

fn build_map(config: &MapConfig, registry: &OverlayRegistry) -> Result<Map, PlanMapError> {
    let mut builder = MapBuilder::default()
        .with_position(config.center)
        .with_z_level(config.zoom);

    for basemap in &config.basemaps {
        builder = builder.with_layer(build_tile_layer(basemap)?);
    }
    builder = builder.with_layer(build_tile_layer(&config.reference_overlay)?);
    for controller in registry.iter() {
        builder = builder.with_layer(controller.layer());
    }

    let mut map = builder.build();

    // Only the first basemap starts visible, and the reference overlay
    // stays hidden until the imagery basemap is selected.
    let layers = map.layers_mut();
    for index in 1..=config.basemaps.len() {
        layers.hide(index);
    }

    Ok(map)
}

fn spawn_loaders(
    runtime: &tokio::runtime::Runtime,
    config: &MapConfig,
    events: Sender<LoadEvent>,
) -> usize {
    let service = FeatureService::new();
    let mut pending = 0;

    for entry in &config.overlays {
        let service = service.clone();
        let query = entry.query.clone();
        let id = entry.id.clone();
        let events = events.clone();
        pending += 1;
        runtime.spawn(async move {
            let features = match service.fetch(&query).await {
                Ok(features) => {
                    info!("overlay {id}: loaded {} features", features.len());
                    features
                }
                Err(err) => {
                    error!("overlay {id}: feature query failed: {err}");
                    Vec::new()
                }
            };
            let _ = events.send(LoadEvent::Features { id, features });
        });
    }

    if let Some(source) = config.label_overrides.clone() {
        pending += 1;
        runtime.spawn(async move {
            let table = LabelOverrides::load(&source).await;
            let _ = events.send(LoadEvent::Overrides(table));
        });
    }

    pending
}

struct PlanMapApp {
    map: EguiMapState,
    config: MapConfig,
    registry: OverlayRegistry,
    coordinator: ContrastCoordinator,
    events: Receiver<LoadEvent>,
    pending: usize,
    overrides: Option<Arc<LabelOverrides>>,
    active_basemap: usize,
    overlay_visible: Vec<bool>,
    last_z_level: u32,
    // keeps the loader tasks alive for the lifetime of the window
    _runtime: tokio::runtime::Runtime,
}

impl PlanMapApp {
    fn new(
        map: EguiMapState,
        config: MapConfig,
        registry: OverlayRegistry,
        events: Receiver<LoadEvent>,
        pending: usize,
        runtime: tokio::runtime::Runtime,
    ) -> Self {
        let last_z_level = z_level_for_resolution(map.map().view().resolution());
        let overlay_visible = vec![true; config.overlays.len()];
        Self {
            map,
            config,
            registry,
            coordinator: ContrastCoordinator::new(),
            events,
            pending,
            overrides: None,
            active_basemap: 0,
            overlay_visible,
            last_z_level,
            _runtime: runtime,
        }
    }

    fn reference_layer_index(&self) -> usize {
        self.config.basemaps.len()
    }

    fn overlay_layer_index(&self, overlay: usize) -> usize {
        self.config.basemaps.len() + 1 + overlay
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            match event {
                LoadEvent::Features { id, features } => {
                    let overrides = self.overrides.clone();
                    let fit = match self.registry.get_mut(&id) {
                        Some(controller) => {
                            let fit = controller.set_features(features);
                            controller.refresh_labels(self.last_z_level, overrides.as_ref());
                            fit
                        }
                        None => None,
                    };
                    if let Some(bounds) = fit {
                        self.fit_view(bounds);
                    }
                }
                LoadEvent::Overrides(table) => {
                    self.overrides = table.map(Arc::new);
                    let overrides = self.overrides.clone();
                    self.registry
                        .refresh_labels(self.last_z_level, overrides.as_ref());
                }
            }
            self.map.request_redraw();
        }
    }

    /// Refreshes labels when the view crosses a z-level boundary.
    fn watch_zoom(&mut self) {
        let z_level = z_level_for_resolution(self.map.map().view().resolution());
        if z_level != self.last_z_level {
            self.last_z_level = z_level;
            let overrides = self.overrides.clone();
            self.registry.refresh_labels(z_level, overrides.as_ref());
            self.map.request_redraw();
        }
    }

    /// Moves the viewport to the given projected bounds with a bit of
    /// padding, preserving the window size.
    fn fit_view(&mut self, bounds: Rect) {
        let size = self.map.map().view().size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return;
        }
        let padded = bounds.magnify(1.15);
        let resolution = (padded.width() / size.width()).max(padded.height() / size.height());
        if !resolution.is_finite() || resolution <= 0.0 {
            return;
        }
        let target = MapView::new_projected(&padded.center(), resolution);
        self.map
            .map_mut()
            .animate_to(target, Duration::from_millis(500));
        self.map.request_redraw();
    }

    fn switch_basemap(&mut self, index: usize) {
        if index == self.active_basemap || index >= self.config.basemaps.len() {
            return;
        }
        let previous = self.active_basemap;
        self.active_basemap = index;

        let layers = self.map.map_mut().layers_mut();
        layers.hide(previous);
        layers.show(index);

        let show_reference = self
            .coordinator
            .basemap_changed(&self.config.basemaps[index], &mut self.registry);
        let reference_index = self.reference_layer_index();
        let layers = self.map.map_mut().layers_mut();
        if show_reference {
            layers.show(reference_index);
        } else {
            layers.hide(reference_index);
        }
        self.map.request_redraw();
    }

    fn layer_control(&mut self, ctx: &egui::Context) {
        egui::Window::new("Layers")
            .anchor(egui::Align2::RIGHT_TOP, [-10.0, 10.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("Basemap");
                let mut selected = self.active_basemap;
                for (index, basemap) in self.config.basemaps.iter().enumerate() {
                    ui.radio_value(&mut selected, index, &basemap.title);
                }
                if selected != self.active_basemap {
                    self.switch_basemap(selected);
                }

                ui.separator();
                ui.label("Overlays");
                let mut toggles = Vec::new();
                for (index, entry) in self.config.overlays.iter().enumerate() {
                    let mut visible = self.overlay_visible[index];
                    if ui.checkbox(&mut visible, &entry.title).changed() {
                        toggles.push((index, visible));
                    }
                }
                for (index, visible) in toggles {
                    self.overlay_visible[index] = visible;
                    let layer_index = self.overlay_layer_index(index);
                    let layers = self.map.map_mut().layers_mut();
                    if visible {
                        layers.show(layer_index);
                    } else {
                        layers.hide(layer_index);
                    }
                    self.map.request_redraw();
                }
            });
    }

    fn attribution(&mut self, ctx: &egui::Context) {
        egui::Window::new("Attribution")
            .title_bar(false)
            .resizable(false)
            .anchor(egui::Align2::RIGHT_BOTTOM, [-10.0, -10.0])
            .show(ctx, |ui| {
                match &self.config.attribution.url {
                    Some(url) => {
                        ui.hyperlink_to(&self.config.attribution.text, url);
                    }
                    None => {
                        ui.label(&self.config.attribution.text);
                    }
                }
                for credit in self
                    .registry
                    .iter()
                    .filter_map(|controller| controller.entry().attribution.as_ref())
                {
                    match &credit.url {
                        Some(url) => {
                            ui.hyperlink_to(&credit.text, url);
                        }
                        None => {
                            ui.label(&credit.text);
                        }
                    }
                }
                self.map.show_attributions(ui);
            });
    }
}

impl eframe::App for PlanMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.watch_zoom();

        egui::CentralPanel::default().show(ctx, |ui| {
            EguiMap::new(&mut self.map).show_ui(ui);
        });

        self.layer_control(ctx);
        self.attribution(ctx);

        if self.pending > 0 {
            // keep draining the load channel while anything is in flight
            ctx.request_repaint_after(Duration::from_millis(200));
        }
    }
}
