use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use schemars::schema_for;
use serde_json::Value as JsonValue;

const MAX_REPORTED_ERRORS: usize = 10;

/// Schema generated directly from the Rust account structs, so validation
/// stays in lockstep with what `serde` will accept.
static ACCOUNTS_SCHEMA_GENERATED: Lazy<JsonValue> = Lazy::new(|| {
    let schema = schema_for!(crate::accounts::AccountsFile);
    serde_json::to_value(&schema).expect("schemars schema must serialize to JSON")
});

static ACCOUNTS_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&ACCOUNTS_SCHEMA_GENERATED)
        .expect("failed to compile generated accounts JSON schema")
});

/// Validate a parsed accounts document. The error lists up to ten
/// violations, each prefixed with its instance path.
pub fn validate_accounts_json(value: &JsonValue) -> Result<(), String> {
    match ACCOUNTS_SCHEMA.validate(value) {
        Ok(()) => Ok(()),
        Err(err_iter) => {
            let mut msgs: Vec<String> = Vec::new();
            for (i, e) in err_iter.enumerate() {
                if i >= MAX_REPORTED_ERRORS {
                    msgs.push("... (more schema errors omitted)".to_string());
                    break;
                }
                let instance_path = e.instance_path.to_string();
                let path = if instance_path.is_empty() {
                    "/".to_string()
                } else {
                    instance_path
                };
                msgs.push(format!("at {path}: {e}"));
            }
            Err(format!("schema validation failed:\n{}", msgs.join("\n")))
        }
    }
}

pub fn accounts_schema() -> &'static JsonValue {
    &ACCOUNTS_SCHEMA_GENERATED
}
