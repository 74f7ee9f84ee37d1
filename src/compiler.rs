//! Turns parsed instruction lines into [`Step`] records.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::step::{Step, NAME_DELIMITER};
use crate::syntax::Instruction;
use crate::{err_src, TorsoError};

/// Compiles step lines against a resources root used to locate config files.
#[derive(Debug, Clone)]
pub struct StepCompiler {
    resources_root: PathBuf,
}

impl StepCompiler {
    pub fn new(resources_root: impl Into<PathBuf>) -> Self {
        Self {
            resources_root: resources_root.into(),
        }
    }

    /// Compiles every instruction in order. The first malformed line fails the lot.
    pub fn compile(&self, instructions: &[Instruction]) -> Result<Vec<Step>, TorsoError> {
        instructions.iter().map(|i| self.compile_one(i)).collect()
    }

    /// `name,configFile[,repeat]`, where name is `id__class__interface__function`.
    pub fn compile_one(&self, instruction: &Instruction) -> Result<Step, TorsoError> {
        let fields: Vec<&str> = instruction.text.split(',').map(str::trim).collect();
        let name = fields[0];

        let parts: Vec<&str> = name.split(NAME_DELIMITER).collect();
        let [_, class_name, interface_name, function_name] = parts.as_slice() else {
            return Err(err_src!(
                Compile,
                format!(
                    "Step name '{}' has {} part(s), expected 4",
                    name,
                    parts.len()
                ),
                &instruction.source,
                instruction.span,
                "Step names are 'id__Class__Interface__Function'"
            ));
        };

        let config_field = fields.get(1).copied().unwrap_or_default();
        let config_file = self.resolve_config(name, config_field);

        let repeat = match fields.get(2).copied() {
            Some(raw) if !raw.is_empty() => raw.parse::<u32>().map_err(|e| {
                err_src!(
                    Compile,
                    format!("Invalid repeat count '{}': {}", raw, e),
                    &instruction.source,
                    instruction.span
                )
            })?,
            _ => 0,
        };

        Ok(Step {
            name: name.to_string(),
            class_name: class_name.to_string(),
            interface_name: interface_name.to_string(),
            function_name: function_name.to_string(),
            config_file,
            repeat,
            passed: false,
            elapsed: Duration::ZERO,
            attempts: 0,
        })
    }

    /// The field as written if it names a file, else `<root>/<name>/<field>`, else none.
    fn resolve_config(&self, name: &str, field: &str) -> Option<PathBuf> {
        if field.is_empty() {
            return None;
        }
        let direct = Path::new(field);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }
        let under_root = self.resources_root.join(name).join(field);
        under_root.is_file().then_some(under_root)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::diagnostics::ErrorType;
    use crate::syntax::RunFileParser;

    fn instructions(text: &str) -> Vec<Instruction> {
        RunFileParser::new()
            .parse_text(Path::new("inline.run"), text)
            .unwrap()
    }

    #[test]
    fn test_name_splits_into_parts() {
        let compiler = StepCompiler::new("no-such-root");
        let steps = compiler
            .compile(&instructions("7__CMVCore__IMVCore__Load,missing.xml,2\n"))
            .unwrap();
        let step = &steps[0];
        assert_eq!(step.name, "7__CMVCore__IMVCore__Load");
        assert_eq!(step.class_name, "CMVCore");
        assert_eq!(step.interface_name, "IMVCore");
        assert_eq!(step.function_name, "Load");
        assert_eq!(step.repeat, 2);
        assert_eq!(step.config_file, None);
    }

    #[test]
    fn test_short_name_is_compile_error() {
        let compiler = StepCompiler::new("no-such-root");
        let err = compiler
            .compile(&instructions("7__CMVCore__Load,cfg\n"))
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Compile);
    }

    #[test]
    fn test_bad_repeat_is_compile_error() {
        let compiler = StepCompiler::new("no-such-root");
        for line in ["a__b__c__d,cfg,x\n", "a__b__c__d,cfg,-1\n"] {
            let err = compiler.compile(&instructions(line)).unwrap_err();
            assert_eq!(err.error_type(), ErrorType::Compile);
        }
    }

    #[test]
    fn test_empty_repeat_and_missing_config_field() {
        let compiler = StepCompiler::new("no-such-root");
        let steps = compiler
            .compile(&instructions("a__b__c__d,,\na__b__c__d\n"))
            .unwrap();
        assert!(steps.iter().all(|s| s.repeat == 0 && s.config_file.is_none()));
    }

    #[test]
    fn test_config_resolved_under_resources_root() {
        let root = tempfile::tempdir().unwrap();
        let name = "3__CClass__IFace__Run";
        fs::create_dir_all(root.path().join(name)).unwrap();
        fs::write(root.path().join(name).join("job.xml"), "<job/>").unwrap();

        let compiler = StepCompiler::new(root.path());
        let steps = compiler
            .compile(&instructions(&format!("{},job.xml\n", name)))
            .unwrap();
        assert_eq!(
            steps[0].config_file.as_deref(),
            Some(root.path().join(name).join("job.xml").as_path())
        );
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = StepCompiler::new("no-such-root");
        let parsed = instructions("(\na__b__c__d,x,1\ne__f__g__h,y\n)*2\n");
        assert_eq!(
            compiler.compile(&parsed).unwrap(),
            compiler.compile(&parsed).unwrap()
        );
    }
}
