pub mod store;

pub use store::{FutureSample, InstrumentState, ScannerStore, TickSample, UnderlyingSeries};
