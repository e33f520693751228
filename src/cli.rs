//! 命令行参数解析
//!
//! `-model <path>` 开始一个新的模型组，其后的 `-vmd <path>` 依次归入该组。

use std::path::PathBuf;

use crate::{MmdError, Result};

/// 用法说明
pub const USAGE: &str = "app [-model <pmd|pmx file path>] [-vmd <vmd file path>]\n\
e.g. app -model model1.pmx -vmd anim1_1.vmd -vmd anim1_2.vmd  -model model2.pmx";

/// 一个模型及其动作文件
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelInput {
    pub model_path: PathBuf,
    pub vmd_paths: Vec<PathBuf>,
}

/// 将参数（不含程序名）分组为模型输入
///
/// 未知参数被忽略；没有任何参数、`-model`/`-vmd` 缺少值、
/// 或 `-vmd` 出现在第一个 `-model` 之前时返回 `MmdError::Usage`。
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<Vec<ModelInput>> {
    if args.is_empty() {
        return Err(MmdError::Usage("no arguments given".to_string()));
    }

    let mut inputs = Vec::new();
    let mut current: Option<ModelInput> = None;
    let mut iter = args.iter().map(AsRef::as_ref);

    while let Some(arg) = iter.next() {
        match arg {
            "-model" => {
                let path = iter
                    .next()
                    .ok_or_else(|| MmdError::Usage("-model requires a file path".to_string()))?;
                if let Some(done) = current.take() {
                    inputs.push(done);
                }
                current = Some(ModelInput {
                    model_path: PathBuf::from(path),
                    vmd_paths: Vec::new(),
                });
            }
            "-vmd" => {
                let input = current
                    .as_mut()
                    .ok_or_else(|| MmdError::Usage("-vmd must follow -model".to_string()))?;
                let path = iter
                    .next()
                    .ok_or_else(|| MmdError::Usage("-vmd requires a file path".to_string()))?;
                input.vmd_paths.push(PathBuf::from(path));
            }
            other => log::debug!("ignoring argument: {}", other),
        }
    }

    inputs.extend(current);
    Ok(inputs)
}
