//! Shutter Presentation
//!
//! The UI-facing half of the camera: a view-model that mirrors the capture
//! session as bindable state, and the gesture router for the live preview.
//! No rendering lives here; a UI toolkit reads [`ViewState`] and feeds
//! gestures in.

pub mod gestures;
pub mod view_model;

pub use gestures::{
    FocusIndicator, GestureAction, GestureRouter, DEFAULT_TAP_WINDOW, FOCUS_INDICATOR_DURATION,
};
pub use view_model::{CameraViewModel, DisplayState, ViewState};
