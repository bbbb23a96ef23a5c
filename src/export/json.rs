use super::ExportError;
use crate::models::TrainingPlan;
use std::io::Write;
use std::path::Path;

/// Export any serializable data structure to JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let json_data = to_pretty_string(data)?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;
    file.write_all(b"\n")?;

    Ok(())
}

pub fn to_pretty_string<T: serde::Serialize>(data: &T) -> Result<String, ExportError> {
    serde_json::to_string_pretty(data).map_err(|e| ExportError::SerializationError(e.to_string()))
}

/// Read a plan previously written by [`export_json`]
pub fn load_plan<P: AsRef<Path>>(input_path: P) -> Result<TrainingPlan, ExportError> {
    let content = std::fs::read_to_string(input_path)?;
    serde_json::from_str(&content).map_err(|e| ExportError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::create_test_plan;
    use tempfile::NamedTempFile;

    #[test]
    fn test_plan_survives_file_round_trip() {
        let plan = create_test_plan();
        let temp_file = NamedTempFile::new().unwrap();

        export_json(&plan, temp_file.path()).unwrap();
        let loaded = load_plan(temp_file.path()).unwrap();

        assert_eq!(loaded, plan);
    }

    #[test]
    fn test_decimals_written_as_strings() {
        let plan = create_test_plan();
        let json = to_pretty_string(&plan.weeks[0]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert!(value["target_volume_km"].is_string());
        assert_eq!(value["week_number"], 1);
    }

    #[test]
    fn test_load_plan_rejects_garbage() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "{ not json").unwrap();

        assert!(matches!(
            load_plan(temp_file.path()),
            Err(ExportError::SerializationError(_))
        ));
    }
}
