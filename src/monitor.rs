//! Optional windowed VRAM presenter, adapted from the teacher's `Monitor`
//! device. Not part of the emulation core's public contract (SPEC_FULL.md
//! §1/§6 expose VRAM as a plain pixel buffer); this lives in the binary.

use minifb::{Window, WindowOptions};

pub struct Monitor {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl Monitor {
    pub fn new(width: usize, height: usize) -> Box<Monitor> {
        let window = Window::new("rpsx", width, height, WindowOptions::default())
            .unwrap_or_else(|e| panic!("{}", e));
        Box::new(Monitor {
            window,
            buffer: vec![0; width * height],
            width,
            height,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// Blits the GPU's `A1B5G5R5` VRAM into the window's RGB buffer.
    pub fn present(&mut self, vram: &[u16]) {
        for (dst, &pixel) in self.buffer.iter_mut().zip(vram.iter()) {
            let r = ((pixel & 0x1F) as u32) << 3;
            let g = (((pixel >> 5) & 0x1F) as u32) << 3;
            let b = (((pixel >> 10) & 0x1F) as u32) << 3;
            *dst = (r << 16) | (g << 8) | b;
        }
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .expect("error updating screen");
    }
}
