mod config;

pub mod aggregate;
pub mod builder;
pub mod compile;
pub mod flow;
pub mod manual;
pub mod narrative;
pub mod render;

pub use crate::aggregate::{aggregate, cross_aggregate};
pub use crate::compile::{compile, compile_document};
pub use crate::config::*;
pub use crate::flow::{FlowStep, Session};
pub use crate::narrative::narrate;
pub use crate::render::{export_docx, preview, render_document, Renderer};
