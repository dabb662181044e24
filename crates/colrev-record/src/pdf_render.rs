//! First-page rasteriser for PDF fingerprints
//!
//! Paints filled paths, image XObjects (raw, Flate, LZW, ASCII85 and DCT
//! encoded) and form XObjects in device gray. Text is drawn as glyph boxes
//! along the text matrix, which keeps the page layout without a font
//! engine.

use image::{GrayImage, ImageFormat, Luma};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

/// Rendering resolution
pub(crate) const RENDER_DPI: f64 = 200.0;

const MAX_SIDE: f64 = 4000.0;
const MAX_DEPTH: usize = 8;
const US_LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
const GLYPH_ADVANCE: f64 = 0.55;

/// Affine transform `[a b c d e f]` in PDF row-vector convention
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    fn from_operands(values: &[f64]) -> Option<Self> {
        match *values {
            [a, b, c, d, e, f] => Some(Self::new(a, b, c, d, e, f)),
            _ => None,
        }
    }

    const fn translate(x: f64, y: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    /// Maps the unit square onto the rectangle
    const fn rect(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(w, 0.0, 0.0, h, x, y)
    }

    /// `self` first, then `next`
    fn then(self, next: Self) -> Self {
        Self::new(
            self.a * next.a + self.b * next.c,
            self.a * next.b + self.b * next.d,
            self.c * next.a + self.d * next.c,
            self.c * next.b + self.d * next.d,
            self.e * next.a + self.f * next.c + next.e,
            self.e * next.b + self.f * next.d + next.f,
        )
    }

    fn apply(self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    fn invert(self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        Some(Self::new(
            self.d / det,
            -self.b / det,
            -self.c / det,
            self.a / det,
            (self.c * self.f - self.d * self.e) / det,
            (self.b * self.e - self.a * self.f) / det,
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GraphicsState {
    ctm: Matrix,
    fill: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    size: f64,
    leading: f64,
}

impl TextState {
    fn next_line(&mut self, x: f64, y: f64) {
        self.tlm = Matrix::translate(x, y).then(self.tlm);
        self.tm = self.tlm;
    }

    fn advance(&mut self, dx: f64) {
        self.tm = Matrix::translate(dx, 0.0).then(self.tm);
    }
}

#[derive(Debug)]
enum Shape {
    Rect(f64, f64, f64, f64),
    Points(Vec<(f64, f64)>),
}

struct Canvas {
    image: GrayImage,
    device: Matrix,
}

impl Canvas {
    /// Paint the image of the unit square under `unit`; `sample` gets the
    /// unit-square coordinates of each covered pixel
    fn paint(&mut self, unit: Matrix, mut sample: impl FnMut(f64, f64) -> Option<u8>) {
        let m = unit.then(self.device);
        let Some(inverse) = m.invert() else {
            return;
        };
        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(x, y)| m.apply(x, y));
        let (width, height) = self.image.dimensions();
        let min = |pick: fn(&(f64, f64)) -> f64| corners.iter().map(pick).fold(f64::INFINITY, f64::min);
        let max = |pick: fn(&(f64, f64)) -> f64| corners.iter().map(pick).fold(f64::NEG_INFINITY, f64::max);
        let x0 = min(|p| p.0).floor().max(0.0) as u32;
        let x1 = max(|p| p.0).ceil().min(f64::from(width)) as u32;
        let y0 = min(|p| p.1).floor().max(0.0) as u32;
        let y1 = max(|p| p.1).ceil().min(f64::from(height)) as u32;

        for py in y0..y1 {
            for px in x0..x1 {
                let (u, v) = inverse.apply(f64::from(px) + 0.5, f64::from(py) + 0.5);
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                if let Some(luma) = sample(u, v) {
                    self.image.put_pixel(px, py, Luma([luma]));
                }
            }
        }
    }
}

/// Render the first page of `doc` in device gray
///
/// Returns `None` for documents without pages or with undecodable page
/// content.
pub(crate) fn render_first_page(doc: &Document) -> Option<GrayImage> {
    let (_, page_id) = doc.get_pages().into_iter().next()?;
    let [llx, lly, urx, ury] = media_box(doc, page_id);
    let (width, height) = (urx - llx, ury - lly);
    if width <= 0.0 || height <= 0.0 {
        return None;
    }

    let scale = (RENDER_DPI / 72.0).min(MAX_SIDE / width.max(height));
    let image = GrayImage::from_pixel(
        (width * scale).ceil() as u32,
        (height * scale).ceil() as u32,
        Luma([u8::MAX]),
    );
    let device = Matrix::new(scale, 0.0, 0.0, -scale, -llx * scale, ury * scale);

    let content = doc.get_page_content(page_id).ok()?;
    let resources = page_resources(doc, page_id);
    let mut renderer = Renderer {
        doc,
        canvas: Canvas { image, device },
    };
    renderer.run(&content, &resources, GraphicsState::default(), 0)?;
    Some(renderer.canvas.image)
}

fn deref<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    doc.dereference(object).ok().map(|(_, o)| o)
}

fn number(object: &Object) -> Option<f64> {
    object.as_float().ok().map(f64::from)
}

fn numbers(objects: &[Object]) -> Vec<f64> {
    objects.iter().filter_map(number).collect()
}

/// Page and its ancestors, nearest first
fn page_tree(doc: &Document, page_id: ObjectId) -> Vec<&Dictionary> {
    let mut nodes = Vec::new();
    let mut next = doc.get_dictionary(page_id).ok();
    while let Some(node) = next {
        if nodes.len() > MAX_DEPTH * 4 {
            break;
        }
        nodes.push(node);
        next = node
            .get(b"Parent")
            .and_then(Object::as_reference)
            .ok()
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    nodes
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    page_tree(doc, page_id)
        .into_iter()
        .find_map(|node| {
            let values = deref(doc, node.get(b"MediaBox").ok()?)?.as_array().ok()?;
            match numbers(values)[..] {
                [x0, y0, x1, y1] => Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]),
                _ => None,
            }
        })
        .unwrap_or(US_LETTER)
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Vec<&Dictionary> {
    page_tree(doc, page_id)
        .into_iter()
        .filter_map(|node| deref(doc, node.get(b"Resources").ok()?)?.as_dict().ok())
        .collect()
}

/// Luminance of a colour operand list (gray, RGB or CMYK in 0..1)
fn luminance(args: &[f64]) -> Option<u8> {
    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match *args {
        [gray] => Some(channel(gray)),
        [r, g, b] => Some(rgb_luma(channel(r), channel(g), channel(b))),
        [c, m, y, k] => Some(cmyk_luma(channel(c), channel(m), channel(y), channel(k))),
        _ => None,
    }
}

fn rgb_luma(r: u8, g: u8, b: u8) -> u8 {
    let luma = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000;
    u8::try_from(luma).unwrap_or(u8::MAX)
}

fn cmyk_luma(c: u8, m: u8, y: u8, k: u8) -> u8 {
    let channel = |v: u8| u8::try_from(255u16.saturating_sub(u16::from(v) + u16::from(k))).unwrap_or(0);
    rgb_luma(channel(c), channel(m), channel(y))
}

/// Vertical extent of a glyph box in units of the font size
fn glyph_extent(byte: u8) -> Option<(f64, f64)> {
    match byte {
        0..=b' ' => None,
        b'.' | b':' => Some((0.0, 0.12)),
        b',' | b';' => Some((-0.12, 0.12)),
        b'-' | b'~' => Some((0.25, 0.35)),
        b'_' => Some((-0.1, 0.0)),
        b'g' | b'j' | b'p' | b'q' | b'y' => Some((-0.2, 0.5)),
        b'b' | b'd' | b'f' | b'h' | b'i' | b'k' | b'l' | b't' => Some((0.0, 0.7)),
        b'a'..=b'z' => Some((0.0, 0.5)),
        _ => Some((0.0, 0.7)),
    }
}

struct Renderer<'a> {
    doc: &'a Document,
    canvas: Canvas,
}

impl<'a> Renderer<'a> {
    fn run(&mut self, content: &[u8], resources: &[&'a Dictionary], mut gs: GraphicsState, depth: usize) -> Option<()> {
        let content = Content::decode(content).ok()?;
        let mut saved = Vec::new();
        let mut text = TextState::default();
        let mut path: Vec<Shape> = Vec::new();

        for op in &content.operations {
            let args = numbers(&op.operands);
            match op.operator.as_str() {
                "q" => saved.push(gs),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        gs = previous;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&args) {
                        gs.ctm = m.then(gs.ctm);
                    }
                }
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(luma) = luminance(&args) {
                        gs.fill = luma;
                    }
                }
                "re" => {
                    if let [x, y, w, h] = args[..] {
                        path.push(Shape::Rect(x, y, w, h));
                    }
                }
                "m" => path.push(Shape::Points(points(&args))),
                "l" | "c" | "v" | "y" => match path.last_mut() {
                    Some(Shape::Points(current)) => current.extend(points(&args)),
                    _ => path.push(Shape::Points(points(&args))),
                },
                "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    for shape in path.drain(..) {
                        self.fill_shape(&shape, gs);
                    }
                }
                "n" | "S" | "s" => path.clear(),
                "BT" => {
                    text.tm = Matrix::IDENTITY;
                    text.tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let Some(size) = args.last() {
                        text.size = *size;
                    }
                }
                "TL" => {
                    if let [leading] = args[..] {
                        text.leading = leading;
                    }
                }
                "Td" => {
                    if let [x, y] = args[..] {
                        text.next_line(x, y);
                    }
                }
                "TD" => {
                    if let [x, y] = args[..] {
                        text.leading = -y;
                        text.next_line(x, y);
                    }
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(&args) {
                        text.tm = m;
                        text.tlm = m;
                    }
                }
                "T*" => text.next_line(0.0, -text.leading),
                "Tj" | "TJ" => self.show_text(&op.operands, &mut text, gs),
                "'" => {
                    text.next_line(0.0, -text.leading);
                    self.show_text(&op.operands, &mut text, gs);
                }
                "\"" => {
                    text.next_line(0.0, -text.leading);
                    self.show_text(op.operands.get(2..).unwrap_or(&[]), &mut text, gs);
                }
                "Do" => {
                    if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                        self.draw_xobject(name, resources, gs, depth);
                    }
                }
                _ => {}
            }
        }
        Some(())
    }

    fn fill_shape(&mut self, shape: &Shape, gs: GraphicsState) {
        let (x, y, w, h) = match shape {
            Shape::Rect(x, y, w, h) => (*x, *y, *w, *h),
            Shape::Points(points) if !points.is_empty() => {
                let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
                let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
                for &(x, y) in points {
                    (x0, y0, x1, y1) = (x0.min(x), y0.min(y), x1.max(x), y1.max(y));
                }
                (x0, y0, x1 - x0, y1 - y0)
            }
            Shape::Points(_) => return,
        };
        let fill = gs.fill;
        self.canvas.paint(Matrix::rect(x, y, w, h).then(gs.ctm), |_, _| Some(fill));
    }

    /// Text operands: strings, and for `TJ` arrays with kerning numbers
    fn show_text(&mut self, operands: &[Object], text: &mut TextState, gs: GraphicsState) {
        for operand in operands {
            match operand {
                Object::String(bytes, _) => {
                    for &byte in bytes {
                        self.glyph(byte, text, gs);
                        text.advance(GLYPH_ADVANCE * text.size);
                    }
                }
                Object::Array(items) => self.show_text(items, text, gs),
                other => {
                    if let Some(kerning) = number(other) {
                        text.advance(-kerning / 1000.0 * text.size);
                    }
                }
            }
        }
    }

    fn glyph(&mut self, byte: u8, text: &TextState, gs: GraphicsState) {
        let Some((bottom, top)) = glyph_extent(byte) else {
            return;
        };
        let size = text.size;
        let unit = Matrix::rect(0.05 * size, bottom * size, 0.45 * size, (top - bottom) * size)
            .then(text.tm)
            .then(gs.ctm);
        let fill = gs.fill;
        self.canvas.paint(unit, |_, _| Some(fill));
    }

    fn draw_xobject(&mut self, name: &[u8], resources: &[&'a Dictionary], gs: GraphicsState, depth: usize) {
        let doc = self.doc;
        let stream = resources.iter().find_map(|dict| {
            let xobjects = deref(doc, dict.get(b"XObject").ok()?)?.as_dict().ok()?;
            deref(doc, xobjects.get(name).ok()?)?.as_stream().ok()
        });
        let Some(stream) = stream else {
            debug!(name = %String::from_utf8_lossy(name), "XObject not found");
            return;
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name_str) {
            Ok("Image") => self.draw_image(stream, gs),
            Ok("Form") if depth < MAX_DEPTH => self.draw_form(stream, resources, gs, depth),
            _ => {}
        }
    }

    fn draw_form(&mut self, form: &'a Stream, resources: &[&'a Dictionary], mut gs: GraphicsState, depth: usize) {
        let doc = self.doc;
        let matrix = form
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| deref(doc, m))
            .and_then(|m| m.as_array().ok())
            .and_then(|m| Matrix::from_operands(&numbers(m)))
            .unwrap_or(Matrix::IDENTITY);
        let own = form
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| deref(doc, r))
            .and_then(|r| r.as_dict().ok());
        let scope: Vec<&'a Dictionary> = own.into_iter().chain(resources.iter().copied()).collect();

        let Ok(content) = form.get_plain_content() else {
            debug!("form XObject content not decodable");
            return;
        };
        gs.ctm = matrix.then(gs.ctm);
        if self.run(&content, &scope, gs, depth + 1).is_none() {
            debug!("form XObject operators not decodable");
        }
    }

    fn draw_image(&mut self, stream: &Stream, gs: GraphicsState) {
        let Some(raster) = decode_image(self.doc, stream) else {
            debug!("image XObject not decodable");
            return;
        };
        let (width, height) = raster.pixels.dimensions();
        let fill = gs.fill;
        self.canvas.paint(gs.ctm, |u, v| {
            let x = ((u * f64::from(width)) as u32).min(width - 1);
            let y = (((1.0 - v) * f64::from(height)) as u32).min(height - 1);
            let value = raster.pixels.get_pixel(x, y).0[0];
            if raster.stencil {
                (value == 0).then_some(fill)
            } else {
                Some(value)
            }
        });
    }
}

fn points(args: &[f64]) -> Vec<(f64, f64)> {
    args.chunks_exact(2).map(|p| (p[0], p[1])).collect()
}

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed { base: Box<ColorSpace>, lookup: Vec<u8> },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    fn luma(&self, samples: &[u8]) -> u8 {
        match (self, samples) {
            (Self::Gray, [gray, ..]) => *gray,
            (Self::Rgb, [r, g, b, ..]) => rgb_luma(*r, *g, *b),
            (Self::Cmyk, [c, m, y, k, ..]) => cmyk_luma(*c, *m, *y, *k),
            (Self::Indexed { base, lookup }, [index, ..]) => {
                let n = base.components();
                let start = usize::from(*index) * n;
                lookup.get(start..start + n).map_or(0, |entry| base.luma(entry))
            }
            _ => 0,
        }
    }
}

fn color_space(doc: &Document, object: &Object) -> Option<ColorSpace> {
    let object = deref(doc, object)?;
    if let Ok(name) = object.as_name_str() {
        return match name {
            "DeviceGray" | "CalGray" | "G" => Some(ColorSpace::Gray),
            "DeviceRGB" | "CalRGB" | "RGB" => Some(ColorSpace::Rgb),
            "DeviceCMYK" | "CMYK" => Some(ColorSpace::Cmyk),
            _ => None,
        };
    }

    let array = object.as_array().ok()?;
    match array.first()?.as_name_str().ok()? {
        "ICCBased" => {
            let profile = deref(doc, array.get(1)?)?.as_stream().ok()?;
            match profile.dict.get(b"N").and_then(Object::as_i64).ok()? {
                1 => Some(ColorSpace::Gray),
                3 => Some(ColorSpace::Rgb),
                4 => Some(ColorSpace::Cmyk),
                _ => None,
            }
        }
        "CalGray" => Some(ColorSpace::Gray),
        "CalRGB" => Some(ColorSpace::Rgb),
        "Indexed" | "I" => {
            let base = color_space(doc, array.get(1)?)?;
            let lookup = match deref(doc, array.get(3)?)? {
                Object::String(bytes, _) => bytes.clone(),
                Object::Stream(table) => table.get_plain_content().ok()?,
                _ => return None,
            };
            Some(ColorSpace::Indexed {
                base: Box::new(base),
                lookup,
            })
        }
        _ => None,
    }
}

/// Decoded image in device gray; stencil masks paint where the sample is 0
struct Raster {
    pixels: GrayImage,
    stencil: bool,
}

fn read_sample(row: &[u8], bit_offset: usize, bits: usize) -> u32 {
    let byte = bit_offset / 8;
    match bits {
        16 => (u32::from(row[byte]) << 8) | u32::from(row[byte + 1]),
        8 => u32::from(row[byte]),
        _ => {
            let shift = 8 - bits - bit_offset % 8;
            (u32::from(row[byte]) >> shift) & ((1 << bits) - 1)
        }
    }
}

fn decode_image(doc: &Document, stream: &Stream) -> Option<Raster> {
    let dict = &stream.dict;
    let int = |key: &[u8]| dict.get(key).ok().and_then(|o| deref(doc, o)).and_then(|o| o.as_i64().ok());
    let width = u32::try_from(int(b"Width")?).ok().filter(|w| *w > 0)?;
    let height = u32::try_from(int(b"Height")?).ok().filter(|h| *h > 0)?;
    let stencil = dict.get(b"ImageMask").and_then(Object::as_bool).unwrap_or(false);

    let filters = stream.filters().unwrap_or_default();
    if filters.iter().any(|f| f == "DCTDecode") {
        if filters.len() != 1 {
            return None;
        }
        let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok()?;
        return Some(Raster {
            pixels: decoded.to_luma8(),
            stencil: false,
        });
    }
    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        // lopdf refuses to decompress streams typed as images
        let mut plain = stream.clone();
        plain.dict.remove(b"Subtype");
        plain.decompressed_content().ok()?
    };

    let bits = if stencil {
        1
    } else {
        usize::try_from(int(b"BitsPerComponent").unwrap_or(8)).ok()?
    };
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return None;
    }
    let space = if stencil {
        ColorSpace::Gray
    } else {
        color_space(doc, dict.get(b"ColorSpace").ok()?)?
    };
    let inverted = dict
        .get(b"Decode")
        .ok()
        .and_then(|d| deref(doc, d))
        .and_then(|d| d.as_array().ok())
        .is_some_and(|d| matches!(numbers(d)[..], [lo, hi, ..] if lo > hi));

    let n = space.components();
    let indexed = matches!(space, ColorSpace::Indexed { .. });
    let row_bytes = (width as usize * n * bits).div_ceil(8);
    if data.len() < row_bytes * height as usize {
        return None;
    }
    let max = (1u32 << bits) - 1;

    let mut pixels = GrayImage::new(width, height);
    let mut samples = vec![0u8; n];
    for (y, row) in (0..height).zip(data.chunks_exact(row_bytes)) {
        for x in 0..width {
            for (i, sample) in samples.iter_mut().enumerate() {
                let raw = read_sample(row, (x as usize * n + i) * bits, bits);
                let value = if indexed { raw } else { raw * 255 / max };
                *sample = u8::try_from(value).unwrap_or(u8::MAX);
            }
            let luma = space.luma(&samples);
            pixels.put_pixel(x, y, Luma([if inverted { u8::MAX - luma } else { luma }]));
        }
    }
    Some(Raster { pixels, stencil })
}
