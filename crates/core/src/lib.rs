pub mod config;
pub mod error;
pub mod interval;
pub mod model;
pub mod traits;

pub use config::{env_flag, env_opt, load_dotenv, Properties};
pub use error::*;
pub use interval::{IntervalError, IntervalSpec, IntervalUnit, DEFAULT_INTERVAL};
pub use model::*;
pub use traits::{ChangeFeed, ChangeListener, DefinitionsLookup, RecordSink};
