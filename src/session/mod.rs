mod sequence;
pub mod session;
pub mod state;

pub use session::{AnalysisSession, Outcome};
pub use state::{AttributionState, ImageState, LayerState, ModelState, SelectionState, SessionState};
