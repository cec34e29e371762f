// Common imports and types shared across the application

pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};

pub use crate::config::{Config, Device};
pub use crate::error::Error as ProtocolError;
pub use crate::options::Options;
pub use crate::protocols::result::{CommandResult, Reading, Value};
pub use crate::protocols::DeviceProtocol;
