//! fwgen-lib: firmware build orchestration
//!
//! Turns a device configuration into a compiled ESP firmware image:
//! - `source`: the shared template checkout and per-build workspaces
//! - `template`: rewriting the workspace's `config.h`
//! - `toolchain`: PlatformIO / Arduino CLI behind one `BuildStrategy` trait
//! - `pipeline`: sequencing the above, owning build ids and cleanup

pub mod build_id;
pub mod config;
pub mod consts;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod request;
pub mod source;
pub mod template;
pub mod toolchain;
pub mod util;
pub mod warning;

pub use build_id::BuildId;
pub use config::PipelineConfig;
pub use pipeline::{GenerateResult, Pipeline, PipelineError, UploadResult};
pub use request::BuildRequest;
