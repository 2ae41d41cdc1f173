//! Builders for the Go statements the transformer injects: the logging
//! prolog at the head of an instrumented function, and the correlation
//! recording call placed before matching returns.

use super::registry::LoggerKind;

pub const LOG_CALL_FUNCTION: &str = "LogCall";
pub const RECORD_FUNCTION: &str = "RecordMethodByName";
pub const CORRELATION_LOOKUP_KEY: &str = "_correlation_lookup";

/// Assembles one `LogCall` prolog statement.
///
/// Arguments keep insertion order so generated code is deterministic:
/// receiver first, then parameters in declaration order, then sentinels.
pub struct LogCallBuilder {
    package_name: String,
    logger: LoggerKind,
    operation: String,
    args: Vec<(String, String)>,
}

impl LogCallBuilder {
    pub fn new(package_name: &str, logger: LoggerKind) -> Self {
        Self {
            package_name: package_name.to_string(),
            logger,
            operation: String::new(),
            args: Vec::new(),
        }
    }

    pub fn operation(mut self, name: &str, receiver_type: &str) -> Self {
        self.operation = if receiver_type.is_empty() {
            name.to_string()
        } else {
            format!("{receiver_type}.{name}")
        };
        self
    }

    pub fn param(mut self, name: &str, type_desc: &str) -> Self {
        let rendered = format_arg_expr(name, type_desc, self.logger.package_name());
        self.args.push((name.to_string(), rendered));
        self
    }

    pub fn literal(mut self, name: &str, value: &str) -> Self {
        self.args.push((name.to_string(), format!("\"{value}\"")));
        self
    }

    /// Render the complete statement, e.g.
    /// `instrumentlog.LogCall("reflect.Value.Call", instrumentlog.CallArgs{"v": instrumentlog.FormatValue(v)})`.
    pub fn build(self) -> String {
        let logger = self.logger.package_name();
        let mut stmt = format!(
            "{logger}.{LOG_CALL_FUNCTION}(\"{}.{}\", {logger}.CallArgs{{",
            self.package_name, self.operation
        );
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i > 0 {
                stmt.push_str(", ");
            }
            stmt.push_str(&format!("\"{name}\": {value}"));
        }
        stmt.push_str("})");
        stmt
    }
}

/// Build the correlation recording call inserted immediately before a
/// matched return: `<logger>.RecordMethodByName(<method-value>, <identifier>, <receiver>)`.
pub fn record_correlation_stmt(
    logger: LoggerKind,
    method_value_expr: &str,
    identifier_expr: &str,
    receiver_name: &str,
) -> String {
    format!(
        "{}.{RECORD_FUNCTION}({method_value_expr}, {identifier_expr}, {receiver_name})",
        logger.package_name()
    )
}

/// Wrap a parameter in the typed formatter the logger expects for its
/// classified type. Unknown and composite types fall back to `FormatAny`,
/// which resolves by runtime type; the reflection `Value` type routes
/// through `FormatValue`, whose result is the stable correlation baton.
pub fn format_arg_expr(param_name: &str, type_desc: &str, logger_package: &str) -> String {
    let desc = if type_desc.starts_with("slice:") {
        "slice"
    } else {
        type_desc
    };

    let formatter = match desc {
        "bytes" => "FormatBytes",
        "int" | "int8" | "int16" | "int32" => "FormatInt",
        "int64" => "FormatInt64",
        "uint" | "uint8" | "uint16" | "uint32" => "FormatUint",
        "uint64" | "uintptr" => "FormatUint64",
        "float32" | "float64" => "FormatFloat64",
        "bool" => "FormatBool",
        "string" => "FormatString",
        "any" | "interface" => "FormatAny",
        "slice" => {
            return format!("{logger_package}.FormatInt(len({param_name}))");
        }
        "Value" => "FormatValue",
        _ => "FormatAny",
    };

    format!("{logger_package}.{formatter}({param_name})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_function_prolog() {
        let stmt = LogCallBuilder::new("reflect", LoggerKind::Instrument)
            .operation("ValueOf", "")
            .param("i", "any")
            .build();
        assert_eq!(
            stmt,
            "instrumentlog.LogCall(\"reflect.ValueOf\", instrumentlog.CallArgs{\"i\": instrumentlog.FormatAny(i)})"
        );
    }

    #[test]
    fn builds_method_prolog_with_lookup_sentinel() {
        let stmt = LogCallBuilder::new("reflect", LoggerKind::Instrument)
            .operation("Call", "Value")
            .param("v", "Value")
            .param("in", "slice:Value")
            .literal(CORRELATION_LOOKUP_KEY, "true")
            .build();
        assert_eq!(
            stmt,
            "instrumentlog.LogCall(\"reflect.Value.Call\", instrumentlog.CallArgs{\
             \"v\": instrumentlog.FormatValue(v), \
             \"in\": instrumentlog.FormatInt(len(in)), \
             \"_correlation_lookup\": \"true\"})"
        );
    }

    #[test]
    fn format_logger_routes_through_formatlog() {
        let stmt = LogCallBuilder::new("encoding/json", LoggerKind::Format)
            .operation("Marshal", "")
            .param("v", "any")
            .build();
        assert!(stmt.starts_with("formatlog.LogCall(\"encoding/json.Marshal\""));
        assert!(stmt.contains("formatlog.FormatAny(v)"));
    }

    #[test]
    fn formatter_table() {
        let cases = [
            ("int", "instrumentlog.FormatInt(x)"),
            ("int64", "instrumentlog.FormatInt64(x)"),
            ("uint32", "instrumentlog.FormatUint(x)"),
            ("uintptr", "instrumentlog.FormatUint64(x)"),
            ("float32", "instrumentlog.FormatFloat64(x)"),
            ("bool", "instrumentlog.FormatBool(x)"),
            ("string", "instrumentlog.FormatString(x)"),
            ("bytes", "instrumentlog.FormatBytes(x)"),
            ("slice:int", "instrumentlog.FormatInt(len(x))"),
            ("interface", "instrumentlog.FormatAny(x)"),
            ("Value", "instrumentlog.FormatValue(x)"),
            ("*Value", "instrumentlog.FormatAny(x)"),
            ("io.Reader", "instrumentlog.FormatAny(x)"),
            ("unknown", "instrumentlog.FormatAny(x)"),
        ];
        for (desc, expected) in cases {
            assert_eq!(format_arg_expr("x", desc, "instrumentlog"), expected);
        }
    }

    #[test]
    fn record_statement_shape() {
        let stmt = record_correlation_stmt(
            LoggerKind::Instrument,
            "v.Method(m.Index)",
            "name",
            "v",
        );
        assert_eq!(
            stmt,
            "instrumentlog.RecordMethodByName(v.Method(m.Index), name, v)"
        );
    }
}
