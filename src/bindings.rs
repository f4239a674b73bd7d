//! Python module entry point, built with the `python` feature
use crate::batch::decode_all;
use crate::config::ReconcilerConfig;
use crate::converters::{instructions_to_value, objects_from_json, operations_to_value, snapshot_from_json};
use crate::diff_engine::diff;
use crate::instruction::{InstructionKind, INSTRUCTION_FLAG_MULTIPLE};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

#[pyclass]
pub struct Reconciler {
    config: ReconcilerConfig,
}

#[pymethods]
impl Reconciler {
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(raw) => ReconcilerConfig::from_json(raw)?,
            None => ReconcilerConfig::default(),
        };
        log::debug!("Reconciler: initialized with {:?}", config);
        Ok(Reconciler { config })
    }

    /// Diff two JSON node trees; returns a list of operation dicts.
    fn reconcile<'py>(&self, py: Python<'py>, old_tree: &str, new_tree: &str) -> PyResult<Bound<'py, PyAny>> {
        let old = snapshot_from_json(old_tree)?;
        let new = snapshot_from_json(new_tree)?;
        let operations = diff(&old, &new, &self.config);
        json_to_pyobject(py, &operations_to_value(&operations)?)
    }
}

/// Decode an int buffer plus a JSON object buffer into a list of instruction dicts.
#[pyfunction]
fn decode_batch<'py>(py: Python<'py>, ints: Vec<i32>, objects_json: &str) -> PyResult<Bound<'py, PyAny>> {
    let objects = objects_from_json(objects_json)?;
    let instructions = decode_all(&ints, &objects)?;
    json_to_pyobject(py, &instructions_to_value(&instructions)?)
}

/// Convert JSON to Python with proper type mapping
fn json_to_pyobject<'py>(py: Python<'py>, value: &serde_json::Value) -> PyResult<Bound<'py, PyAny>> {
    match value {
        serde_json::Value::Null => Ok(py.None().into_bound(py).into_any()),
        serde_json::Value::Bool(b) => Ok((*b).into_pyobject(py)?.to_owned().into_any()),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.into_pyobject(py)?.into_any())
            } else if let Some(f) = n.as_f64() {
                Ok(f.into_pyobject(py)?.into_any())
            } else {
                Ok(n.to_string().into_pyobject(py)?.into_any())
            }
        }
        serde_json::Value::String(s) => Ok(s.as_str().into_pyobject(py)?.into_any()),
        serde_json::Value::Array(arr) => {
            let list = PyList::empty(py);
            for v in arr {
                list.append(json_to_pyobject(py, v)?)?;
            }
            Ok(list.into_any())
        }
        serde_json::Value::Object(map) => {
            let dict = PyDict::new(py);
            for (k, v) in map {
                dict.set_item(k, json_to_pyobject(py, v)?)?;
            }
            Ok(dict.into_any())
        }
    }
}

#[pymodule]
fn mount_reconciler(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Reconciler>()?;
    m.add_function(wrap_pyfunction!(decode_batch, m)?)?;

    m.add("INSTRUCTION_FLAG_MULTIPLE", INSTRUCTION_FLAG_MULTIPLE)?;
    for kind in InstructionKind::ALL {
        m.add(format!("{:?}", kind).as_str(), kind.code())?;
    }
    Ok(())
}
