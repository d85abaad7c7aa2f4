pub mod activity;
pub mod coordinator;
pub mod demand;
pub mod error;
pub mod grid;
pub mod openweather;
pub mod provider;
pub mod sink;
pub mod weather;

pub mod test_support;

pub use activity::{ActivityLog, TracingActivityLog};
pub use coordinator::PipelineCoordinator;
pub use demand::{DemandAgent, DemandPredictor, NoNoise, NoiseSource, UniformNoise};
pub use error::{AgentError, SinkError};
pub use grid::{GridBalancer, GridBalancerAgent};
pub use openweather::OpenWeatherProvider;
pub use provider::{ProviderError, WeatherProvider};
pub use sink::{NullSink, PersistenceSink};
pub use weather::{WeatherAgent, WeatherSource, WindCurve};
