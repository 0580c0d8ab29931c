//! Drawing surfaces
//!
//! The crate ships no window; `RecordingSurface` keeps the draw calls as a
//! list so embedders and tests can inspect or replay them.

use std::sync::{Mutex, PoisonError};

use super::Surface;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Resize {
        width: u32,
        height: u32,
    },
    Clear,
    Rect {
        color: String,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
    Circle {
        color: String,
        x: f64,
        y: f64,
        r: f64,
    },
    Line {
        color: String,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Text {
        color: String,
        x: f64,
        y: f64,
        text: String,
    },
    Font(String),
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    ops: Mutex<Vec<DrawOp>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<DrawOp> {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, op: DrawOp) {
        self.ops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }
}

impl Surface for RecordingSurface {
    fn resize(&self, width: u32, height: u32) {
        self.push(DrawOp::Resize { width, height });
    }

    fn clear(&self) {
        self.push(DrawOp::Clear);
    }

    fn fill_rect(&self, color: &str, x: f64, y: f64, w: f64, h: f64) {
        self.push(DrawOp::Rect {
            color: color.to_string(),
            x,
            y,
            w,
            h,
        });
    }

    fn fill_circle(&self, color: &str, x: f64, y: f64, r: f64) {
        self.push(DrawOp::Circle {
            color: color.to_string(),
            x,
            y,
            r,
        });
    }

    fn stroke_line(&self, color: &str, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.push(DrawOp::Line {
            color: color.to_string(),
            x1,
            y1,
            x2,
            y2,
        });
    }

    fn fill_text(&self, color: &str, x: f64, y: f64, text: &str) {
        self.push(DrawOp::Text {
            color: color.to_string(),
            x,
            y,
            text: text.to_string(),
        });
    }

    fn set_font(&self, font: &str) {
        self.push(DrawOp::Font(font.to_string()));
    }
}
