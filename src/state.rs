use std::sync::Arc;

use crate::config::Config;
use crate::geocode::{AddressLookup, Debouncer, Geocoder};
use crate::schedule::GanttMetrics;
use crate::store::DocumentStore;
use crate::sync::Synchronizer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sync: Synchronizer,
    pub addresses: Arc<AddressLookup>,
    pub gantt: GanttMetrics,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        let debouncer = Debouncer::new(config.geocoder.debounce());
        let gantt = GanttMetrics::new(config.gantt.column_width, config.gantt.row_height);
        Self {
            sync: Synchronizer::new(store),
            addresses: Arc::new(AddressLookup::new(geocoder, debouncer)),
            gantt,
            config: Arc::new(config),
        }
    }
}
