use hcl::{
    eval::{Context, FuncArgs},
    Value,
};

pub struct HclFormat;
impl figment::providers::Format for HclFormat {
    type Error = hcl::Error;

    const NAME: &'static str = "HCL";

    fn from_str<'de, T: serde::de::DeserializeOwned>(string: &'de str) -> Result<T, Self::Error> {
        hcl::eval::from_str(string, &get_hcl_context())
    }
}

/// Function to read a value (e.g. a keystore password) from a file.
/// Surrounding whitespace is trimmed.
/// Note that this function is not a part of the HCL specification, but a custom function.
/// Example:
/// ```hcl
/// // HCL document
/// keystore {
///   password = file("/etc/unifi-cert-rotate/keystore.pass")
/// }
/// ```
fn read_value_file(args: FuncArgs) -> Result<Value, String> {
    let Some(path) = args[0].as_str() else {
        return Err("file() expects a path".to_string());
    };

    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Value::String(contents.trim().to_string())),
        Err(err) => Err(format!("unable to read {path}: {err}")),
    }
}

/// Function to retrieve an environment variable from a given HCL template. Useful for secrets.
/// Note that this function is not a part of the HCL specification, but a custom function.
/// Note that the environment variable name must be defined or an error will be returned.
/// Example:
/// ```hcl
/// // HCL document
/// keystore {
///   password = env("UNIFI_STORE_PASSWORD")
/// }
/// ```
fn get_env_var(args: FuncArgs) -> Result<Value, String> {
    let Some(key) = args[0].as_str() else {
        return Err("env() expects a variable name".to_string());
    };

    let Ok(var) = std::env::var(key) else {
        return Err(format!("Environment variable {key} not found"));
    };

    Ok(Value::String(var))
}

/// Get the HCL context for figment
fn get_hcl_context<'a>() -> Context<'a> {
    let env_func = hcl::eval::FuncDef::builder()
        .param(hcl::eval::ParamType::String)
        .build(get_env_var);

    let read_file_func = hcl::eval::FuncDef::builder()
        .param(hcl::eval::ParamType::String)
        .build(read_value_file);

    let mut context = hcl::eval::Context::new();
    context.declare_func("env", env_func);
    context.declare_func("file", read_file_func);

    context
}

/// HashiCorp Configuration Language (HCL) provider for figment
pub type Hcl = figment::providers::Data<HclFormat>;

#[cfg(test)]
mod tests {
    use figment::providers::Format;
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Keystore {
        password: String,
    }

    #[derive(Deserialize)]
    struct Doc {
        keystore: Keystore,
    }

    #[test]
    fn test_file_function_reads_trimmed_contents() {
        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("keystore.pass");
        std::fs::write(&secret, "aircontrolenterprise\n").unwrap();

        let source = format!(
            "keystore {{\n  password = file(\"{}\")\n}}\n",
            secret.display()
        );
        let doc: Doc = HclFormat::from_str(&source).unwrap();

        assert_eq!(doc.keystore.password, "aircontrolenterprise");
    }

    #[test]
    fn test_file_function_missing_file_fails() {
        let result: Result<Doc, _> =
            HclFormat::from_str("keystore {\n  password = file(\"/nonexistent/pass\")\n}\n");
        assert!(result.is_err());
    }
}
