//! The 2D rasterizing GPU: GP0 (data port) and GP1 (control port) state
//! machines, a 1 MiB VRAM framebuffer, and a software rasterizer for flat,
//! shaded, and textured polygons plus rectangles.

use log::trace;

const VRAM_WIDTH: usize = 1024;
const VRAM_HEIGHT: usize = 512;

/// A command word still waiting on its full argument list. Replaces the
/// reference implementation's "function pointer plus words-remaining
/// counter" with an explicit sum type per SPEC_FULL.md §9 — each variant
/// carries exactly the state that command needs, so there is no way to
/// observe a half-built command of the wrong shape.
#[derive(Debug, Clone)]
enum PendingCommand {
    Polygon {
        shaded: bool,
        textured: bool,
        quad: bool,
        transparent: bool,
        raw_blend: bool,
        words: Vec<u32>,
        remaining: u32,
    },
    Rectangle {
        textured: bool,
        transparent: bool,
        size: RectSize,
        words: Vec<u32>,
        remaining: u32,
    },
    VramToVramCopy {
        words: Vec<u32>,
        remaining: u32,
    },
    CpuToVramCopy {
        dest_x: u32,
        dest_y: u32,
        width: u32,
        height: u32,
        received: u32,
        total: u32,
    },
    FillRectangle {
        color: u32,
        words: Vec<u32>,
        remaining: u32,
    },
    VramToCpuCopy {
        src_x: u32,
        src_y: u32,
        width: u32,
        height: u32,
        sent: u32,
        total: u32,
        /// 2 = awaiting the position word, 1 = awaiting the size word, 0 =
        /// streaming. Kept separate from `total` so a genuine one-word
        /// transfer can't be mistaken for the "awaiting size" stage.
        awaiting_params: u8,
    },
}

#[derive(Debug, Clone, Copy)]
enum RectSize {
    Variable,
    Dot,
    Square8,
    Square16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Vertex {
    x: i32,
    y: i32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Color {
    r: u8,
    g: u8,
    b: u8,
}

impl Color {
    fn from_word(word: u32) -> Self {
        Self {
            r: (word & 0xFF) as u8,
            g: ((word >> 8) & 0xFF) as u8,
            b: ((word >> 16) & 0xFF) as u8,
        }
    }

    fn to_pixel(self) -> u16 {
        let r = (self.r >> 3) as u16;
        let g = (self.g >> 3) as u16;
        let b = (self.b >> 3) as u16;
        (b << 10) | (g << 5) | r
    }
}

pub struct Gpu {
    vram: Vec<u16>,
    gp0_pending: Option<PendingCommand>,
    gpuread_latch: u32,

    drawing_area_left: i32,
    drawing_area_top: i32,
    drawing_area_right: i32,
    drawing_area_bottom: i32,
    drawing_offset_x: i32,
    drawing_offset_y: i32,

    texture_window: u32,
    texpage: u32,

    display_enabled: bool,
    dma_direction: u8,
    display_area_start_x: u32,
    display_area_start_y: u32,
}

impl Gpu {
    pub fn new() -> Self {
        let mut gpu = Self {
            vram: vec![0; VRAM_WIDTH * VRAM_HEIGHT],
            gp0_pending: None,
            gpuread_latch: 0,
            drawing_area_left: 0,
            drawing_area_top: 0,
            drawing_area_right: 0,
            drawing_area_bottom: 0,
            drawing_offset_x: 0,
            drawing_offset_y: 0,
            texture_window: 0,
            texpage: 0,
            display_enabled: false,
            dma_direction: 0,
            display_area_start_x: 0,
            display_area_start_y: 0,
        };
        gpu.reset();
        gpu
    }

    pub fn reset(&mut self) {
        self.vram.iter_mut().for_each(|p| *p = 0);
        self.gp0_pending = None;
        self.gpuread_latch = 0;
        self.drawing_area_left = 0;
        self.drawing_area_top = 0;
        self.drawing_area_right = 0;
        self.drawing_area_bottom = 0;
        self.drawing_offset_x = 0;
        self.drawing_offset_y = 0;
        self.texture_window = 0;
        self.texpage = 0;
        self.display_enabled = false;
        self.dma_direction = 0;
        self.display_area_start_x = 0;
        self.display_area_start_y = 0;
    }

    pub fn vram(&self) -> &[u16] {
        &self.vram
    }

    pub fn vram_width(&self) -> usize {
        VRAM_WIDTH
    }

    pub fn vram_height(&self) -> usize {
        VRAM_HEIGHT
    }

    pub fn gpuread(&self) -> u32 {
        self.gpuread_latch
    }

    pub fn gpustat(&self) -> u32 {
        let mut stat: u32 = 0x1C00_0000;
        stat |= (self.texpage & 0x1FF) as u32;
        stat |= (self.dma_direction as u32) << 29;
        if self.display_enabled {
            stat |= 1 << 23;
        }
        // Reported ready regardless of in-flight work: the core never
        // stalls DMA/CPU writers on a busy GPU.
        stat |= 1 << 26; // ready to receive cmd word
        stat |= 1 << 27; // ready to send VRAM to CPU
        stat |= 1 << 28; // ready to receive DMA block
        stat
    }

    pub fn gp0(&mut self, word: u32) {
        if let Some(pending) = self.gp0_pending.take() {
            self.gp0_continue(pending, word);
            return;
        }

        let opcode = word >> 24;
        match opcode {
            0x00 => {}
            0x01 => {}
            0x02 => self.start_fill_rect(word),
            // Quad/triangle and shaded/textured flags follow the opcode's
            // own bit pattern (bit2 = quad, bit4 = shaded, bit0 = semi-
            // transparent); 0x3C/0x3E carry both SHADED and TEXTURED, a
            // combination the grounding renderer resolves by drawing
            // textured-only (its `draw_polygon_helper` checks TEXTURED
            // before SHADED and returns from that branch).
            0x20 => self.start_polygon(false, false, false, false, false, word),
            0x22 => self.start_polygon(false, false, false, true, false, word),
            0x24 => self.start_polygon(false, true, false, false, false, word),
            0x25 => self.start_polygon(false, true, false, false, true, word),
            0x28 => self.start_polygon(false, false, true, false, false, word),
            0x2A => self.start_polygon(false, false, true, true, false, word),
            0x2C => self.start_polygon(false, true, true, false, false, word),
            0x2D => self.start_polygon(false, true, true, false, true, word),
            0x30 => self.start_polygon(true, false, false, false, false, word),
            0x32 => self.start_polygon(true, false, false, true, false, word),
            0x34 => self.start_polygon(true, true, false, false, false, word),
            0x38 => self.start_polygon(true, false, true, false, false, word),
            0x3A => self.start_polygon(true, false, true, true, false, word),
            0x3C => self.start_polygon(true, true, true, false, false, word),
            0x3E => self.start_polygon(true, true, true, true, false, word),
            0x60 => self.start_rectangle(false, false, RectSize::Variable, word),
            0x64 => self.start_rectangle(true, false, RectSize::Variable, word),
            0x65 => self.start_rectangle(true, true, RectSize::Variable, word),
            0x68 => self.start_rectangle(false, false, RectSize::Dot, word),
            0x70 => self.start_rectangle(false, false, RectSize::Square8, word),
            0x78 => self.start_rectangle(false, false, RectSize::Square16, word),
            0x80 => self.start_vram_to_vram(),
            0xA0 => self.start_cpu_to_vram(),
            0xC0 => self.start_vram_to_cpu(),
            0xE1 => self.set_draw_mode(word),
            0xE2 => self.texture_window = word & 0x000F_FFFF,
            0xE3 => {
                self.drawing_area_left = (word & 0x3FF) as i32;
                self.drawing_area_top = ((word >> 10) & 0x3FF) as i32;
            }
            0xE4 => {
                self.drawing_area_right = (word & 0x3FF) as i32;
                self.drawing_area_bottom = ((word >> 10) & 0x3FF) as i32;
            }
            0xE5 => {
                // Per SPEC_FULL.md §9: the 11-bit fields are sign-extended
                // two's-complement offsets, applied to every vertex/rect
                // coordinate before rasterization, not masked-off unsigned
                // quantities.
                self.drawing_offset_x = sign_extend_11(word & 0x7FF);
                self.drawing_offset_y = sign_extend_11((word >> 11) & 0x7FF);
            }
            0xE6 => {}
            0x01..=0x1F => {}
            _ => trace!(target: "rpsx::gpu", "unhandled gp0 opcode {:#04x}", opcode),
        }
    }

    fn set_draw_mode(&mut self, word: u32) {
        self.texpage = word & 0x3FFF;
    }

    fn start_polygon(&mut self, shaded: bool, textured: bool, quad: bool, transparent: bool, raw: bool, word: u32) {
        let vertices = if quad { 4 } else { 3 };
        let mut words = vec![word];
        let per_vertex = 1 + if textured { 1 } else { 0 };
        let shading_extra = if shaded { vertices - 1 } else { 0 };
        let remaining = vertices * per_vertex + shading_extra;
        words.reserve(remaining as usize);
        self.gp0_pending = Some(PendingCommand::Polygon {
            shaded,
            textured,
            quad,
            transparent,
            raw_blend: raw,
            words,
            remaining,
        });
    }

    fn start_rectangle(&mut self, textured: bool, transparent: bool, size: RectSize, word: u32) {
        let mut remaining = 1; // vertex word always follows
        if textured {
            remaining += 1;
        }
        if matches!(size, RectSize::Variable) {
            remaining += 1;
        }
        self.gp0_pending = Some(PendingCommand::Rectangle {
            textured,
            transparent,
            size,
            words: vec![word],
            remaining,
        });
    }

    fn start_vram_to_vram(&mut self) {
        self.gp0_pending = Some(PendingCommand::VramToVramCopy {
            words: Vec::with_capacity(3),
            remaining: 3,
        });
    }

    fn start_cpu_to_vram(&mut self) {
        self.gp0_pending = Some(PendingCommand::CpuToVramCopy {
            dest_x: 0,
            dest_y: 0,
            width: 0,
            height: 0,
            received: 0,
            total: 0,
        });
    }

    fn start_fill_rect(&mut self, word: u32) {
        self.gp0_pending = Some(PendingCommand::FillRectangle {
            color: word & 0x00FF_FFFF,
            words: Vec::with_capacity(2),
            remaining: 2,
        });
    }

    fn start_vram_to_cpu(&mut self) {
        self.gp0_pending = Some(PendingCommand::VramToCpuCopy {
            src_x: 0,
            src_y: 0,
            width: 0,
            height: 0,
            sent: 0,
            total: 0,
            awaiting_params: 2,
        });
    }

    fn gp0_continue(&mut self, pending: PendingCommand, word: u32) {
        match pending {
            PendingCommand::Polygon {
                shaded,
                textured,
                quad,
                transparent,
                raw_blend,
                mut words,
                remaining,
            } => {
                words.push(word);
                let remaining = remaining - 1;
                if remaining == 0 {
                    self.rasterize_polygon(shaded, textured, quad, transparent, raw_blend, &words);
                } else {
                    self.gp0_pending = Some(PendingCommand::Polygon {
                        shaded,
                        textured,
                        quad,
                        transparent,
                        raw_blend,
                        words,
                        remaining,
                    });
                }
            }
            PendingCommand::Rectangle {
                textured,
                transparent,
                size,
                mut words,
                remaining,
            } => {
                words.push(word);
                let remaining = remaining - 1;
                if remaining == 0 {
                    self.rasterize_rectangle(textured, transparent, size, &words);
                } else {
                    self.gp0_pending = Some(PendingCommand::Rectangle {
                        textured,
                        transparent,
                        size,
                        words,
                        remaining,
                    });
                }
            }
            PendingCommand::VramToVramCopy { mut words, remaining } => {
                words.push(word);
                let remaining = remaining - 1;
                if remaining == 0 {
                    self.copy_vram_to_vram(&words);
                } else {
                    self.gp0_pending = Some(PendingCommand::VramToVramCopy { words, remaining });
                }
            }
            PendingCommand::CpuToVramCopy {
                dest_x,
                dest_y,
                width,
                height,
                received,
                total,
            } => {
                if total == 0 {
                    let dest_x = word & 0x3FF;
                    let dest_y = (word >> 16) & 0x1FF;
                    self.gp0_pending = Some(PendingCommand::CpuToVramCopy {
                        dest_x,
                        dest_y,
                        width: 0,
                        height: 0,
                        received: 0,
                        total: 1,
                    });
                    return;
                }
                if total == 1 {
                    let width = ((word & 0xFFFF).max(1)).min(1024);
                    let height = (((word >> 16) & 0xFFFF).max(1)).min(512);
                    let total_pixels = width * height;
                    let total_words = (total_pixels + 1) / 2;
                    self.gp0_pending = Some(PendingCommand::CpuToVramCopy {
                        dest_x,
                        dest_y,
                        width,
                        height,
                        received: 0,
                        total: total_words.max(1),
                    });
                    return;
                }
                self.write_cpu_to_vram_word(dest_x, dest_y, width, height, received, word);
                let received = received + 1;
                if received >= total {
                    // transfer complete
                } else {
                    self.gp0_pending = Some(PendingCommand::CpuToVramCopy {
                        dest_x,
                        dest_y,
                        width,
                        height,
                        received,
                        total,
                    });
                }
            }
            PendingCommand::FillRectangle { color, mut words, remaining } => {
                words.push(word);
                let remaining = remaining - 1;
                if remaining == 0 {
                    self.fill_rect_in_vram(color, &words);
                } else {
                    self.gp0_pending = Some(PendingCommand::FillRectangle { color, words, remaining });
                }
            }
            PendingCommand::VramToCpuCopy {
                src_x,
                src_y,
                width,
                height,
                sent,
                total,
                awaiting_params,
            } => match awaiting_params {
                2 => {
                    let src_x = word & 0x3FF;
                    let src_y = (word >> 16) & 0x1FF;
                    self.gp0_pending = Some(PendingCommand::VramToCpuCopy {
                        src_x,
                        src_y,
                        width: 0,
                        height: 0,
                        sent: 0,
                        total: 0,
                        awaiting_params: 1,
                    });
                }
                1 => {
                    let width = ((word & 0xFFFF).max(1)).min(VRAM_WIDTH as u32);
                    let height = (((word >> 16) & 0xFFFF).max(1)).min(VRAM_HEIGHT as u32);
                    // Matches `copy_rect_to_cpu`'s own `(width * height) / 2`:
                    // an odd pixel count truncates rather than rounding up,
                    // and a transfer that truncates to zero words never
                    // produces data before the port reverts to idle.
                    let total_words = (width * height) / 2;
                    if total_words > 0 {
                        self.gp0_pending = Some(PendingCommand::VramToCpuCopy {
                            src_x,
                            src_y,
                            width,
                            height,
                            sent: 0,
                            total: total_words,
                            awaiting_params: 0,
                        });
                    }
                }
                _ => {
                    self.stream_vram_to_cpu(src_x, src_y, width, sent);
                    let sent = sent + 1;
                    if sent < total {
                        self.gp0_pending = Some(PendingCommand::VramToCpuCopy {
                            src_x,
                            src_y,
                            width,
                            height,
                            sent,
                            total,
                            awaiting_params: 0,
                        });
                    }
                }
            },
        }
    }

    fn write_cpu_to_vram_word(&mut self, dest_x: u32, dest_y: u32, width: u32, height: u32, word_index: u32, word: u32) {
        let pixel_index = word_index * 2;
        for sub in 0..2 {
            let idx = pixel_index + sub;
            if idx >= width * height {
                break;
            }
            let x = (dest_x + idx % width) % VRAM_WIDTH as u32;
            let y = (dest_y + idx / width) % VRAM_HEIGHT as u32;
            let pixel = if sub == 0 { word & 0xFFFF } else { word >> 16 };
            self.vram[(y as usize) * VRAM_WIDTH + x as usize] = pixel as u16;
        }
    }

    /// GP0(02h) Fill Rectangle in VRAM: writes straight into the
    /// framebuffer, bypassing the drawing area clip, mask bit, and dithering
    /// that ordinary draw commands go through. Grounded on `libps/gpu.c`'s
    /// `fill_rect_in_vram`.
    fn fill_rect_in_vram(&mut self, color: u32, words: &[u32]) {
        let x_pos = words[0] & 0xFFFF;
        let y_pos = words[0] >> 16;
        let width = words[1] & 0xFFFF;
        let height = words[1] >> 16;

        let pixel_r = (color & 0xFF) / 8;
        let pixel_g = ((color >> 8) & 0xFF) / 8;
        let pixel_b = ((color >> 16) & 0xFF) / 8;
        let pixel = ((pixel_g << 5) | (pixel_b << 10) | pixel_r) as u16;

        for y in y_pos..y_pos + height {
            for x in x_pos..x_pos + width {
                let vx = (x & 0x3FF) as usize;
                let vy = (y & 0x1FF) as usize;
                self.vram[vy * VRAM_WIDTH + vx] = pixel;
            }
        }
    }

    /// Advances the GP0(C0h) VRAM-to-CPU stream by one word (two pixels)
    /// and latches it into `gpuread`. Called once per pump, the same
    /// convention the reference's DMA2 VRAM-read loop and host GPUREAD
    /// polling use (`libps/bus.c`'s `dma_gpu_vram_read_process`): write a
    /// dummy `GP0` word, then read `gpuread`.
    fn stream_vram_to_cpu(&mut self, src_x: u32, src_y: u32, width: u32, word_index: u32) {
        let pixel_index = word_index * 2;
        let pixel0 = self.vram_pixel_at(src_x, src_y, width, pixel_index);
        let pixel1 = self.vram_pixel_at(src_x, src_y, width, pixel_index + 1);
        self.gpuread_latch = ((pixel1 as u32) << 16) | pixel0 as u32;
    }

    fn vram_pixel_at(&self, src_x: u32, src_y: u32, width: u32, pixel_index: u32) -> u16 {
        let x = (src_x + pixel_index % width) % VRAM_WIDTH as u32;
        let y = (src_y + pixel_index / width) % VRAM_HEIGHT as u32;
        self.vram[(y as usize) * VRAM_WIDTH + x as usize]
    }

    fn copy_vram_to_vram(&mut self, words: &[u32]) {
        let src_x = words[0] & 0x3FF;
        let src_y = (words[0] >> 16) & 0x1FF;
        let dst_x = words[1] & 0x3FF;
        let dst_y = (words[1] >> 16) & 0x1FF;
        let width = ((words[2] & 0xFFFF).max(1)).min(1024);
        let height = (((words[2] >> 16) & 0xFFFF).max(1)).min(512);
        for row in 0..height {
            for col in 0..width {
                let sx = (src_x + col) % VRAM_WIDTH as u32;
                let sy = (src_y + row) % VRAM_HEIGHT as u32;
                let dx = (dst_x + col) % VRAM_WIDTH as u32;
                let dy = (dst_y + row) % VRAM_HEIGHT as u32;
                let pixel = self.vram[(sy as usize) * VRAM_WIDTH + sx as usize];
                self.vram[(dy as usize) * VRAM_WIDTH + dx as usize] = pixel;
            }
        }
    }

    fn rasterize_polygon(
        &mut self,
        shaded: bool,
        textured: bool,
        quad: bool,
        _transparent: bool,
        raw_blend: bool,
        words: &[u32],
    ) {
        let base_color = Color::from_word(words[0]);
        let vertex_count = if quad { 4 } else { 3 };
        let mut vertices = Vec::with_capacity(vertex_count);
        let mut colors = Vec::with_capacity(vertex_count);
        let mut texcoords = Vec::with_capacity(vertex_count);
        let mut clut = 0u32;
        let mut texpage = 0u32;
        let mut idx = 1;
        for i in 0..vertex_count {
            if shaded && i > 0 {
                colors.push(Color::from_word(words[idx]));
                idx += 1;
            } else {
                colors.push(base_color);
            }
            let vw = words[idx];
            idx += 1;
            vertices.push(Vertex {
                x: sign_extend_11(vw & 0x7FF) + self.drawing_offset_x,
                y: sign_extend_11((vw >> 11) & 0x7FF) + self.drawing_offset_y,
            });
            if textured {
                let tw = words[idx];
                idx += 1;
                texcoords.push((tw & 0xFF, (tw >> 8) & 0xFF));
                // The clut ID rides along v0's word and the texpage ID rides
                // along v1's word, per the reference packet layout (see
                // `libps/gpu.c`'s `draw_polygon_helper`).
                if i == 0 {
                    clut = (tw >> 16) & 0xFFFF;
                }
                if i == 1 {
                    texpage = (tw >> 16) & 0xFFFF;
                }
            }
        }

        let triangles: &[(usize, usize, usize)] =
            if quad { &[(0, 1, 2), (1, 2, 3)] } else { &[(0, 1, 2)] };

        for &(i0, i1, i2) in triangles {
            if textured {
                self.fill_triangle_textured(
                    vertices[i0],
                    vertices[i1],
                    vertices[i2],
                    texcoords[i0],
                    texcoords[i1],
                    texcoords[i2],
                    colors[i0],
                    clut,
                    texpage,
                    raw_blend,
                );
            } else {
                self.fill_triangle(vertices[i0], vertices[i1], vertices[i2], colors[i0], colors[i1], colors[i2]);
            }
        }
    }

    /// Resolves a raw texel read from VRAM through the CLUT for 4-bit and
    /// 8-bit indexed texture-page depths; 16-bit (direct-color) texture
    /// pages return the texel unchanged. Grounded on
    /// `libps/renderer/sw.c`'s `process_pixel_through_clut`, extended to the
    /// 8-bit case per SPEC_FULL.md §9 (the grounding file only implements
    /// 4-bit and falls through to a sentinel for everything else).
    fn resolve_clut(&self, texcoord_x: u32, texel: u16, color_depth: u32, clut: u32) -> u16 {
        let clut_x = (clut & 0x3F) * 16;
        let clut_y = (clut >> 6) & 0x1FF;
        match color_depth {
            4 => {
                let offset = (texel as u32 >> ((texcoord_x & 3) * 4)) & 0xF;
                self.vram[(clut_y as usize) * VRAM_WIDTH + (clut_x + offset) as usize]
            }
            8 => {
                let offset = (texel as u32 >> ((texcoord_x & 1) * 8)) & 0xFF;
                self.vram[(clut_y as usize) * VRAM_WIDTH + (clut_x + offset) as usize]
            }
            _ => texel,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_triangle_textured(
        &mut self,
        a: Vertex,
        b: Vertex,
        c: Vertex,
        ta: (u32, u32),
        tb: (u32, u32),
        tc: (u32, u32),
        blend_color: Color,
        clut: u32,
        texpage: u32,
        raw_blend: bool,
    ) {
        let area = edge(a, b, c);
        if area == 0 {
            return;
        }

        let texpage_x_base = texpage & 0xF;
        let texpage_y_base = if texpage & (1 << 4) != 0 { 256 } else { 0 };
        let color_depth = match (texpage >> 7) & 0x3 {
            0 => 4,
            1 => 8,
            _ => 16,
        };

        let min_x = a.x.min(b.x).min(c.x).max(self.drawing_area_left).max(0);
        let max_x = a.x.max(b.x).max(c.x).min(self.drawing_area_right).min(VRAM_WIDTH as i32 - 1);
        let min_y = a.y.min(b.y).min(c.y).max(self.drawing_area_top).max(0);
        let max_y = a.y.max(b.y).max(c.y).min(self.drawing_area_bottom).min(VRAM_HEIGHT as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = Vertex { x, y };
                let w0 = edge(b, c, p);
                let w1 = edge(c, a, p);
                let w2 = edge(a, b, p);
                let inside = (w0 >= 0 && w1 >= 0 && w2 >= 0) || (w0 <= 0 && w1 <= 0 && w2 <= 0);
                if !inside {
                    continue;
                }

                let texcoord_x = ((w0 * ta.0 as i32 + w1 * tb.0 as i32 + w2 * tc.0 as i32) / area) as u32;
                let texcoord_y = ((w0 * ta.1 as i32 + w1 * tb.1 as i32 + w2 * tc.1 as i32) / area) as u32;

                let sample_x = texpage_x_base * 64
                    + match color_depth {
                        4 => texcoord_x / 4,
                        8 => texcoord_x / 2,
                        _ => texcoord_x,
                    };
                let sample_y = texpage_y_base + texcoord_y;
                if sample_x as usize >= VRAM_WIDTH || sample_y as usize >= VRAM_HEIGHT {
                    continue;
                }
                let texel = self.vram[(sample_y as usize) * VRAM_WIDTH + sample_x as usize];
                let mut pixel = self.resolve_clut(texcoord_x, texel, color_depth, clut);
                if pixel == 0x0000 {
                    continue; // fully-transparent texel
                }
                if !raw_blend {
                    pixel = modulate_texel(pixel, blend_color);
                }
                self.vram[(y as usize) * VRAM_WIDTH + x as usize] = pixel;
            }
        }
    }

    fn rasterize_rectangle(&mut self, _textured: bool, _transparent: bool, size: RectSize, words: &[u32]) {
        let color = Color::from_word(words[0]);
        let vw = words[1];
        let x0 = sign_extend_11(vw & 0x7FF) + self.drawing_offset_x;
        let y0 = sign_extend_11((vw >> 11) & 0x7FF) + self.drawing_offset_y;
        let (w, h) = match size {
            RectSize::Dot => (1, 1),
            RectSize::Square8 => (8, 8),
            RectSize::Square16 => (16, 16),
            RectSize::Variable => {
                let dim = words[words.len() - 1];
                ((dim & 0xFFFF) as i32, ((dim >> 16) & 0xFFFF) as i32)
            }
        };
        self.fill_rect(x0, y0, w, h, color);
    }

    fn fill_rect(&mut self, x0: i32, y0: i32, w: i32, h: i32, color: Color) {
        let pixel = color.to_pixel();
        for y in y0..y0 + h {
            if y < self.drawing_area_top || y > self.drawing_area_bottom {
                continue;
            }
            if y < 0 || y as usize >= VRAM_HEIGHT {
                continue;
            }
            for x in x0..x0 + w {
                if x < self.drawing_area_left || x > self.drawing_area_right {
                    continue;
                }
                if x < 0 || x as usize >= VRAM_WIDTH {
                    continue;
                }
                self.vram[(y as usize) * VRAM_WIDTH + x as usize] = pixel;
            }
        }
    }

    /// Pineda edge-function rasterizer: a pixel is inside the triangle when
    /// all three edge functions share the polygon's own winding sign.
    /// Vertex colors are barycentrically interpolated for Gouraud shading.
    fn fill_triangle(&mut self, a: Vertex, b: Vertex, c: Vertex, ca: Color, cb: Color, cc: Color) {
        let area = edge(a, b, c);
        if area == 0 {
            return;
        }

        let min_x = a.x.min(b.x).min(c.x).max(self.drawing_area_left).max(0);
        let max_x = a.x.max(b.x).max(c.x).min(self.drawing_area_right).min(VRAM_WIDTH as i32 - 1);
        let min_y = a.y.min(b.y).min(c.y).max(self.drawing_area_top).max(0);
        let max_y = a.y.max(b.y).max(c.y).min(self.drawing_area_bottom).min(VRAM_HEIGHT as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = Vertex { x, y };
                let w0 = edge(b, c, p);
                let w1 = edge(c, a, p);
                let w2 = edge(a, b, p);
                let inside = (w0 >= 0 && w1 >= 0 && w2 >= 0) || (w0 <= 0 && w1 <= 0 && w2 <= 0);
                if !inside {
                    continue;
                }
                let r = (w0 as f32 * ca.r as f32 + w1 as f32 * cb.r as f32 + w2 as f32 * cc.r as f32) / area as f32;
                let g = (w0 as f32 * ca.g as f32 + w1 as f32 * cb.g as f32 + w2 as f32 * cc.g as f32) / area as f32;
                let bl = (w0 as f32 * ca.b as f32 + w1 as f32 * cb.b as f32 + w2 as f32 * cc.b as f32) / area as f32;
                let color = Color {
                    r: r.abs() as u8,
                    g: g.abs() as u8,
                    b: bl.abs() as u8,
                };
                self.vram[(y as usize) * VRAM_WIDTH + x as usize] = color.to_pixel();
            }
        }
    }

    pub fn gp1(&mut self, word: u32) {
        let opcode = word >> 24;
        match opcode {
            0x00 => self.reset(),
            0x01 => self.gp0_pending = None,
            0x02 => {}
            0x03 => self.display_enabled = (word & 1) == 0,
            0x04 => self.dma_direction = (word & 3) as u8,
            0x05 => {
                self.display_area_start_x = word & 0x3FF;
                self.display_area_start_y = (word >> 10) & 0x1FF;
            }
            0x06 | 0x07 | 0x08 => {}
            _ => trace!(target: "rpsx::gpu", "unhandled gp1 opcode {:#04x}", opcode),
        }
    }
}

fn edge(a: Vertex, b: Vertex, c: Vertex) -> i32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Blends a resolved texel against a per-polygon color, used by textured
/// commands that aren't flagged raw (`GP0(0x2C)` vs raw `GP0(0x2D)`).
fn modulate_texel(texel: u16, color: Color) -> u16 {
    let r = (texel & 0x1F) as u32 * (color.r as u32 >> 3) / 16;
    let g = ((texel >> 5) & 0x1F) as u32 * (color.g as u32 >> 3) / 16;
    let b = ((texel >> 10) & 0x1F) as u32 * (color.b as u32 >> 3) / 16;
    ((b.min(31) as u16) << 10) | ((g.min(31) as u16) << 5) | (r.min(31) as u16)
}

fn sign_extend_11(value: u32) -> i32 {
    ((value << 21) as i32) >> 21
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monochrome_quad_fills_its_bounding_interior() {
        let mut gpu = Gpu::new();
        gpu.gp0(0x2800_0000 | 0x00FF_0000); // opaque monochrome quad, green
        gpu.gp0(0x0010_0010); // vertex 0 (16,16)
        gpu.gp0(0x0010_0030); // vertex 1 (48,16)
        gpu.gp0(0x0030_0010); // vertex 2 (16,48)
        gpu.gp0(0x0030_0030); // vertex 3 (48,48)
        let pixel = gpu.vram()[24 * VRAM_WIDTH + 24];
        assert_ne!(pixel, 0);
    }

    #[test]
    fn drawing_offset_shifts_vertex_coordinates() {
        let mut gpu = Gpu::new();
        gpu.gp0(0xE500_0010); // offset x=16, y=0
        gpu.gp0(0x2800_0000 | 0x0000_00FF);
        gpu.gp0(0x0010_0010);
        gpu.gp0(0x0010_0030);
        gpu.gp0(0x0030_0010);
        gpu.gp0(0x0030_0030);
        let pixel_offset = gpu.vram()[24 * VRAM_WIDTH + 24 + 16];
        assert_ne!(pixel_offset, 0);
    }

    #[test]
    fn rectangle_fill_covers_its_full_area_not_just_one_pixel() {
        let mut gpu = Gpu::new();
        gpu.drawing_area_right = 1023;
        gpu.drawing_area_bottom = 511;
        gpu.gp0(0x6800_00FF); // 1x1 dot at default offset, red
        gpu.gp0(0x0005_0005);
        assert_ne!(gpu.vram()[5 * VRAM_WIDTH + 5], 0);
    }

    #[test]
    fn gp1_reset_clears_vram_and_pending_state() {
        let mut gpu = Gpu::new();
        gpu.vram[0] = 0xFFFF;
        gpu.gp1(0x0000_0000);
        assert_eq!(gpu.vram()[0], 0);
    }

    #[test]
    fn fill_rectangle_writes_every_pixel_in_its_area() {
        let mut gpu = Gpu::new();
        gpu.gp0(0x0200_00FF); // fill rect, red
        gpu.gp0(0x0000_0005); // x=5, y=0
        gpu.gp0(0x0002_0003); // width=3, height=2
        for y in 0..2 {
            for x in 5..8 {
                assert_ne!(gpu.vram()[y * VRAM_WIDTH + x], 0);
            }
        }
        assert_eq!(gpu.vram()[0 * VRAM_WIDTH + 4], 0);
        assert_eq!(gpu.vram()[2 * VRAM_WIDTH + 5], 0);
    }

    #[test]
    fn fill_rectangle_consumes_its_parameter_words_without_desyncing_gp0() {
        let mut gpu = Gpu::new();
        gpu.gp0(0x0200_00FF);
        gpu.gp0(0x0000_0000);
        gpu.gp0(0x0001_0001);
        // The next word is a fresh command, not a leftover parameter.
        gpu.gp0(0x6800_00FF); // 1x1 dot, red
        gpu.gp0(0x0032_0032);
        assert_ne!(gpu.vram()[50 * VRAM_WIDTH + 50], 0);
    }

    #[test]
    fn vram_to_cpu_copy_round_trips_a_cpu_to_vram_write() {
        let mut gpu = Gpu::new();
        gpu.gp0(0xA000_0000); // copy rect CPU->VRAM
        gpu.gp0(0x0000_0000); // dest (0,0)
        gpu.gp0(0x0001_0002); // width=2, height=1
        gpu.gp0(0xBEEF_CAFE); // one word, two pixels

        gpu.gp0(0xC000_0000); // copy rect VRAM->CPU
        gpu.gp0(0x0000_0000); // src (0,0)
        gpu.gp0(0x0001_0002); // width=2, height=1
        gpu.gp0(0); // pump
        assert_eq!(gpu.gpuread(), 0xBEEF_CAFE);
    }

    #[test]
    fn sign_extend_11_handles_negative_offsets() {
        assert_eq!(sign_extend_11(0x7FF), -1);
        assert_eq!(sign_extend_11(0x400), -1024);
        assert_eq!(sign_extend_11(0x010), 16);
    }
}
