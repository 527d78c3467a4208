use std::path::Path;

use ort::session::Session;

use super::tensor::TensorLayout;

/// One model output copied out of the ONNX Runtime arena.
#[derive(Clone, Debug)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl ModelOutput {
    pub fn last_dim(&self) -> usize {
        self.shape.last().copied().unwrap_or(0)
    }
}

/// Loads a model with the preferred execution providers for this platform.
///
/// CPU stays available as the implicit fallback when the platform
/// provider cannot be registered.
pub fn load_session(model_path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let session = Session::builder()?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    log::debug!("Loaded model {}", model_path.display());
    Ok(session)
}

/// Reads the tensor layout of the first model input.
///
/// Converted BlazeFace-family models ship in both NHWC and NCHW form;
/// the channel axis is the one of size 3.
pub fn input_layout(session: &Session) -> TensorLayout {
    session
        .inputs()
        .first()
        .and_then(|input| {
            if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                if shape.len() == 4 && shape[3] == 3 {
                    Some(TensorLayout::Nhwc)
                } else {
                    Some(TensorLayout::Nchw)
                }
            } else {
                None
            }
        })
        .unwrap_or(TensorLayout::Nchw)
}

/// Runs a single-input model and copies every output.
pub fn run(
    session: &mut Session,
    input: ndarray::Array4<f32>,
) -> Result<Vec<ModelOutput>, Box<dyn std::error::Error>> {
    let value = ort::value::Tensor::from_array(input)?;
    let outputs = session.run(ort::inputs![value])?;
    let mut copied = Vec::with_capacity(outputs.len());
    for i in 0..outputs.len() {
        let array = outputs[i].try_extract_array::<f32>()?;
        copied.push(ModelOutput {
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        });
    }
    Ok(copied)
}

/// Splits SSD detector outputs into (regressors, scores).
///
/// Converted models do not agree on output order, so the regressor
/// tensor is recognised by its trailing dimension.
pub fn regressors_and_scores(
    outputs: &[ModelOutput],
    regressor_width: usize,
    anchor_count: usize,
) -> Result<(&[f32], &[f32]), Box<dyn std::error::Error>> {
    if outputs.len() < 2 {
        return Err(format!("detector model expected 2 outputs, got {}", outputs.len()).into());
    }
    let (reg, scores) = if outputs[0].last_dim() == regressor_width {
        (&outputs[0], &outputs[1])
    } else {
        (&outputs[1], &outputs[0])
    };
    if reg.data.len() < anchor_count * regressor_width || scores.data.len() < anchor_count {
        return Err(format!(
            "detector outputs too small for {} anchors (regressors {:?}, scores {:?})",
            anchor_count, reg.shape, scores.shape
        )
        .into());
    }
    Ok((reg.data.as_slice(), scores.data.as_slice()))
}

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
