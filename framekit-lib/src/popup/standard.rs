//! Real popup windows.

use super::PopupRequest;
use crate::config::{PopupOptions, POPUP_BASE_OPTIONS};
use crate::errors::SdkError;
use std::rc::Rc;

/// Host window measurements used to center the popup.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HostGeometry {
    pub outer_width: Option<f64>,
    pub outer_height: Option<f64>,
    pub screen_x: f64,
    pub screen_y: f64,
    /// Document client size, used when outer size is unavailable.
    pub client_width: f64,
    pub client_height: f64,
}

impl HostGeometry {
    pub fn window_width(&self) -> f64 {
        self.outer_width
            .filter(|w| *w > 0.0)
            .unwrap_or(self.client_width)
    }

    pub fn window_height(&self) -> f64 {
        self.outer_height
            .filter(|h| *h > 0.0)
            .unwrap_or(self.client_height)
    }
}

/// Opens top-level windows (`window.open`).
pub trait WindowOpener {
    /// Returns `None` when the platform refused (e.g. a popup blocker).
    fn open(&self, url: &str, name: &str, features: &str) -> Option<Box<dyn PopupWindow>>;

    fn geometry(&self) -> HostGeometry;
}

/// Handle to an opened window.
pub trait PopupWindow {
    fn is_closed(&self) -> bool;
    fn close(&self);
    fn focus(&self);
    fn navigate(&self, url: &str);
}

/// Build the `window.open` feature string, centered on the host window
/// unless `top`/`left` are given explicitly.
pub fn popup_features(options: &PopupOptions, geometry: &HostGeometry) -> String {
    let height = f64::from(options.height);
    let width = f64::from(options.width);
    let top = options.top.unwrap_or_else(|| {
        (geometry.window_height() / 2.0 - height / 2.0 + geometry.screen_y).round() as i32
    });
    let left = options.left.unwrap_or_else(|| {
        (geometry.window_width() / 2.0 - width / 2.0 + geometry.screen_x).round() as i32
    });

    format!(
        "{},height={},width={},top={},left={}",
        POPUP_BASE_OPTIONS, options.height, options.width, top, left
    )
}

pub struct StandardPopup {
    opener: Rc<dyn WindowOpener>,
    options: PopupOptions,
    window: Option<Box<dyn PopupWindow>>,
}

impl StandardPopup {
    pub fn new(opener: Rc<dyn WindowOpener>, options: PopupOptions) -> Self {
        Self {
            opener,
            options,
            window: None,
        }
    }

    pub fn initialize<F: FnOnce()>(&mut self, ready: F) {
        ready();
    }

    pub fn open(&mut self, request: &PopupRequest) -> Result<(), SdkError> {
        let features = popup_features(&self.options, &self.opener.geometry());
        let window = self
            .opener
            .open(&request.url, &request.window_name, &features)
            .ok_or_else(|| {
                SdkError::frame_open_failed()
                    .with_details(serde_json::json!({ "reason": "popup blocked" }))
            })?;
        self.window = Some(window);
        Ok(())
    }

    pub fn focus(&self) {
        if let Some(window) = &self.window {
            window.focus();
        }
    }

    pub fn close(&mut self) {
        if let Some(window) = &self.window {
            if !window.is_closed() {
                window.close();
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.window.as_ref().map_or(true, |window| window.is_closed())
    }

    pub fn redirect(&mut self, url: &str) {
        if let Some(window) = &self.window {
            window.navigate(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_centered_on_outer_size() {
        let geometry = HostGeometry {
            outer_width: Some(1200.0),
            outer_height: Some(900.0),
            screen_x: 100.0,
            screen_y: 50.0,
            client_width: 0.0,
            client_height: 0.0,
        };
        let features = popup_features(&PopupOptions::default(), &geometry);
        // top = 450 - 267.5 + 50, left = 600 - 225 + 100
        assert_eq!(
            features,
            "resizable,scrollbars,height=535,width=450,top=233,left=475"
        );
    }

    #[test]
    fn test_features_fall_back_to_client_size() {
        let geometry = HostGeometry {
            outer_width: Some(0.0),
            outer_height: None,
            screen_x: 0.0,
            screen_y: 0.0,
            client_width: 1000.0,
            client_height: 800.0,
        };
        let options = PopupOptions {
            height: 400,
            width: 400,
            ..PopupOptions::default()
        };
        assert_eq!(
            popup_features(&options, &geometry),
            "resizable,scrollbars,height=400,width=400,top=200,left=300"
        );
    }

    #[test]
    fn test_explicit_offsets_win() {
        let options = PopupOptions {
            top: Some(5),
            left: Some(6),
            ..PopupOptions::default()
        };
        let features = popup_features(&options, &HostGeometry::default());
        assert!(features.ends_with("top=5,left=6"));
    }
}
