//! The conversion pipeline's stages, one module per stage.
//!
//! Stages run strictly in order and communicate only through typed artifact
//! sequences ([`crate::model::Frame`], [`crate::model::Narration`],
//! [`crate::model::Clip`]) plus files in the [`crate::workspace::Workspace`].
//! The controller in [`crate::convert`] drives them and enforces the
//! index-alignment invariant between stages.

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod input;
pub mod narrate;
pub mod raster;
