/// YOLO-style part detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, per-class decoding and
/// per-kind NMS post-processing.
use std::path::Path;

use crate::detection::domain::detector::{DetectionError, Detector, PartKind, RawDetection};
use crate::shared::frame::Frame;
use crate::shared::geometry::Rect;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for part detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Default NMS IoU threshold.
pub const DEFAULT_NMS_IOU: f64 = 0.45;

/// Maps model class indices to part kinds.
///
/// Two-class player models conventionally put the full-body class
/// first; both indices are configurable for models laid out otherwise.
#[derive(Clone, Copy, Debug)]
pub struct ClassMap {
    pub body: usize,
    pub head: usize,
}

impl Default for ClassMap {
    fn default() -> Self {
        Self { body: 0, head: 1 }
    }
}

impl ClassMap {
    fn kind_of(&self, class: usize) -> Option<PartKind> {
        if class == self.head {
            Some(PartKind::Head)
        } else if class == self.body {
            Some(PartKind::Body)
        } else {
            None
        }
    }

    fn max_index(&self) -> usize {
        self.head.max(self.body)
    }
}

/// Part detector backed by an ONNX Runtime session.
pub struct OnnxDetector {
    session: ort::session::Session,
    classes: ClassMap,
    confidence: f64,
    nms_iou: f64,
    input_size: u32,
}

impl OnnxDetector {
    /// Load a YOLO-style ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape
    /// (expecting NCHW). Falls back to 640 if the shape is dynamic or
    /// unreadable.
    pub fn new(
        model_path: &Path,
        classes: ClassMap,
        confidence: f64,
        nms_iou: f64,
    ) -> Result<Self, DetectionError> {
        let session = ort::session::Session::builder()
            .map_err(backend_err)?
            .with_execution_providers(preferred_execution_providers())
            .map_err(|e| backend_err(e.into()))?
            .commit_from_file(model_path)
            .map_err(backend_err)?;

        // Try to read input size from model metadata (NCHW: [1, 3, H, W])
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            classes,
            confidence,
            nms_iou,
            input_size,
        })
    }
}

impl Detector for OnnxDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, DetectionError> {
        // 1. Preprocess: letterbox + normalize → NCHW float32
        let (input_tensor, mapping) = letterbox(frame, self.input_size);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(backend_err)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(backend_err)?;
        if outputs.len() == 0 {
            return Err(DetectionError::ContractViolation(
                "model produced no outputs".into(),
            ));
        }
        let tensor = outputs[0].try_extract_array::<f32>().map_err(backend_err)?;
        let shape = tensor.shape();

        // YOLO output shape is [1, num_features, num_detections]
        // (transposed) or [1, num_detections, num_features]. Handle both.
        let (num_dets, num_feats) = if shape.len() == 3 {
            if shape[1] < shape[2] {
                (shape[2], shape[1])
            } else {
                (shape[1], shape[2])
            }
        } else {
            return Err(DetectionError::ContractViolation(format!(
                "unexpected output shape: {shape:?}"
            )));
        };

        if num_feats < 5 {
            return Err(DetectionError::ContractViolation(format!(
                "output rows carry {num_feats} values, need 4 box coordinates plus class scores"
            )));
        }
        let num_classes = num_feats - 4;
        if self.classes.max_index() >= num_classes {
            return Err(DetectionError::ContractViolation(format!(
                "class map references class {} but the model reports {num_classes} classes",
                self.classes.max_index()
            )));
        }

        let data = tensor.as_slice().ok_or_else(|| {
            DetectionError::ContractViolation("output tensor is not contiguous".into())
        })?;
        let transposed = shape.len() == 3 && shape[1] < shape[2];

        // 3. Parse + per-kind NMS
        let ctx = DecodeContext {
            classes: self.classes,
            confidence: self.confidence,
            frame_w: frame.width() as f64,
            frame_h: frame.height() as f64,
            mapping,
        };
        let dets = decode_proposals(data, num_dets, num_feats, transposed, &ctx);
        Ok(non_max_suppress(dets, self.nms_iou))
    }
}

fn backend_err(err: ort::Error) -> DetectionError {
    DetectionError::Backend(Box::new(err))
}

/// Preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// How letterbox coordinates map back to frame coordinates.
#[derive(Clone, Copy, Debug)]
struct LetterboxMapping {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns the NCHW float32 tensor and the coordinate mapping.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, LetterboxMapping) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Build padded image (filled with 114/255 gray, YOLO convention)
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize + copy into padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        LetterboxMapping {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct DecodeContext {
    classes: ClassMap,
    confidence: f64,
    frame_w: f64,
    frame_h: f64,
    mapping: LetterboxMapping,
}

/// Reads every model proposal, keeping those whose best class is a
/// mapped part kind above the confidence threshold, and mapping their
/// boxes from letterbox space back to clamped frame coordinates.
///
/// Proposal rows are `[cx, cy, w, h, class scores…]`; transposed output
/// stores the rows column-major.
fn decode_proposals(
    data: &[f32],
    num_dets: usize,
    num_feats: usize,
    transposed: bool,
    ctx: &DecodeContext,
) -> Vec<RawDetection> {
    let num_classes = num_feats - 4;
    let pad_x = ctx.mapping.pad_x as f64;
    let pad_y = ctx.mapping.pad_y as f64;

    let mut dets = Vec::new();
    for i in 0..num_dets {
        let at = |f: usize| -> f32 {
            if transposed {
                data[f * num_dets + i]
            } else {
                data[i * num_feats + f]
            }
        };

        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..num_classes {
            let score = at(4 + c);
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        let confidence = best_score as f64;
        if confidence < ctx.confidence {
            continue;
        }
        let Some(kind) = ctx.classes.kind_of(best_class) else {
            continue;
        };

        let cx = at(0) as f64;
        let cy = at(1) as f64;
        let w = at(2) as f64;
        let h = at(3) as f64;

        // Convert from letterbox coords back to original frame coords
        let x1 = ((cx - w / 2.0) - pad_x) / ctx.mapping.scale;
        let y1 = ((cy - h / 2.0) - pad_y) / ctx.mapping.scale;
        let x2 = ((cx + w / 2.0) - pad_x) / ctx.mapping.scale;
        let y2 = ((cy + h / 2.0) - pad_y) / ctx.mapping.scale;
        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            continue;
        }

        let bounds = Rect::new(
            x1.clamp(0.0, ctx.frame_w).round() as i32,
            y1.clamp(0.0, ctx.frame_h).round() as i32,
            x2.clamp(0.0, ctx.frame_w).round() as i32,
            y2.clamp(0.0, ctx.frame_h).round() as i32,
        );
        let Ok(bounds) = bounds else {
            continue;
        };

        dets.push(RawDetection {
            kind,
            bounds,
            confidence,
        });
    }
    dets
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy NMS within each part class: highest confidence wins; boxes of
/// different kinds never suppress each other.
fn non_max_suppress(mut dets: Vec<RawDetection>, iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets {
        let dominated = keep
            .iter()
            .any(|k| k.kind == det.kind && k.bounds.iou(&det.bounds) > iou_thresh);
        if !dominated {
            keep.push(det);
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
