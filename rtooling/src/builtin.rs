//! Built-in stand-in tools and the declaration subsets offered per call site.
//!
//! None of these tools reach a real service. They return deterministic, plausible text
//! so the model-to-tool calling contract can be exercised end to end.
//!
//! ```rust
//! use rtooling::{ToolSet, builtin_registry};
//!
//! let registry = builtin_registry().expect("built-ins register");
//! assert_eq!(registry.len(), 11);
//! assert_eq!(ToolSet::Chat.declarations().len(), 3);
//! ```

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use chrono_tz::Tz;
use rgateway::ToolDeclaration;
use serde_json::{Value, json};

use crate::{
    Arguments, Calculator, ToolError, ToolExecutionContext, ToolRegistry, format_general,
    optional_count, optional_string, required_string,
};

pub const WEB_SEARCH: &str = "web_search";
pub const CALCULATE: &str = "calculate";
pub const GET_CURRENT_TIME: &str = "get_current_time";
pub const GET_WEATHER: &str = "get_weather";
pub const ANALYZE_IMAGE: &str = "analyze_image";
pub const TRANSLATE_TEXT: &str = "translate_text";
pub const ANALYZE_DOCUMENT: &str = "analyze_document";
pub const GENERATE_CODE: &str = "generate_code";
pub const FORMAT_DATA: &str = "format_data";
pub const VALIDATE_JSON: &str = "validate_json";
pub const EXTRACT_TEXT: &str = "extract_text";

const MAX_SEARCH_RESULTS: usize = 3;

/// Which declarations a call site advertises to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolSet {
    #[default]
    Chat,
    Search,
    Full,
}

impl ToolSet {
    pub fn tool_names(self) -> &'static [&'static str] {
        match self {
            Self::Chat => &[WEB_SEARCH, CALCULATE, GET_CURRENT_TIME],
            Self::Search => &[WEB_SEARCH],
            Self::Full => &[
                WEB_SEARCH,
                CALCULATE,
                GET_CURRENT_TIME,
                GET_WEATHER,
                ANALYZE_IMAGE,
                TRANSLATE_TEXT,
                ANALYZE_DOCUMENT,
                GENERATE_CODE,
                FORMAT_DATA,
                VALIDATE_JSON,
                EXTRACT_TEXT,
            ],
        }
    }

    /// Chat and search advertise trimmed schemas; `Full` advertises every parameter.
    pub fn declarations(self) -> Vec<ToolDeclaration> {
        match self {
            Self::Chat => vec![
                ToolDeclaration::new(
                    WEB_SEARCH,
                    "Search the web for current information",
                    object_schema(json!({"query": string_param("Search query")}), &["query"]),
                ),
                ToolDeclaration::new(
                    CALCULATE,
                    "Perform mathematical calculations",
                    object_schema(
                        json!({"expression": string_param("Mathematical expression to calculate")}),
                        &["expression"],
                    ),
                ),
                ToolDeclaration::new(
                    GET_CURRENT_TIME,
                    "Get the current date and time",
                    object_schema(json!({}), &[]),
                ),
            ],
            Self::Search => vec![ToolDeclaration::new(
                WEB_SEARCH,
                "Search the web for information",
                object_schema(
                    json!({
                        "query": string_param("Search query"),
                        "num_results": {
                            "type": "integer",
                            "description": "Number of results to return",
                            "default": 10,
                        },
                    }),
                    &["query"],
                ),
            )],
            Self::Full => full_declarations(),
        }
    }
}

/// Registry holding every built-in tool under its full declaration.
pub fn builtin_registry() -> Result<ToolRegistry, ToolError> {
    let calculator = Calculator::new()?;
    let mut registry = ToolRegistry::new();
    let mut declarations = full_declarations().into_iter();
    let mut next = |name: &str| {
        declarations
            .next()
            .filter(|declaration| declaration.name == name)
            .ok_or_else(|| ToolError::execution(format!("missing declaration for {name}")))
    };

    registry.register_sync_fn(next(WEB_SEARCH)?, |args, _| web_search(&args, Utc::now()));
    registry.register_sync_fn(next(CALCULATE)?, move |args, _| {
        calculate(&calculator, &args)
    });
    registry.register_sync_fn(next(GET_CURRENT_TIME)?, |args, _| {
        current_time(&args, Utc::now())
    });
    registry.register_sync_fn(next(GET_WEATHER)?, |args, _| weather(&args, Utc::now()));
    registry.register_sync_fn(next(ANALYZE_IMAGE)?, analyze_image);
    registry.register_sync_fn(next(TRANSLATE_TEXT)?, translate_text);
    registry.register_sync_fn(next(ANALYZE_DOCUMENT)?, analyze_document);
    registry.register_sync_fn(next(GENERATE_CODE)?, generate_code);
    registry.register_sync_fn(next(FORMAT_DATA)?, format_data);
    registry.register_sync_fn(next(VALIDATE_JSON)?, validate_json);
    registry.register_sync_fn(next(EXTRACT_TEXT)?, extract_text);

    Ok(registry)
}

fn web_search(args: &Arguments, now: DateTime<Utc>) -> Result<String, ToolError> {
    let query = required_string(args, "query")?;
    let limit = optional_count(args, "num_results", 5).min(MAX_SEARCH_RESULTS);

    let candidates = [
        (
            format!("Search result for: {query}"),
            "https://example.com/result1",
            format!("This is a comprehensive result about {query} with detailed information."),
        ),
        (
            format!("Latest news about {query}"),
            "https://news.example.com/article",
            format!("Recent developments and updates regarding {query} from reliable sources."),
        ),
        (
            format!("Complete guide to {query}"),
            "https://guide.example.com/topic",
            format!(
                "A detailed guide covering all aspects of {query} with examples and best practices."
            ),
        ),
    ];

    let mut text = format!("Search results for '{query}':\n\n");
    for (index, (title, url, snippet)) in candidates.iter().take(limit).enumerate() {
        let published = now - TimeDelta::days(index as i64);
        text.push_str(&format!("{}. **{title}**\n", index + 1));
        text.push_str(&format!("   URL: {url}\n"));
        text.push_str(&format!("   {snippet}\n"));
        text.push_str(&format!("   Published: {}\n\n", published.format("%Y-%m-%d")));
    }
    Ok(text)
}

fn calculate(calculator: &Calculator, args: &Arguments) -> Result<String, ToolError> {
    let expression = required_string(args, "expression")?;
    let value = calculator.evaluate(&expression).map_err(|error| ToolError {
        message: format!(
            "failed to calculate expression '{expression}': {}",
            error.message
        ),
        ..error
    })?;
    Ok(format!(
        "Calculation: {expression} = {}",
        format_general(value)
    ))
}

/// Unknown zones fall back to UTC while the reply keeps the requested label.
fn current_time(args: &Arguments, now: DateTime<Utc>) -> Result<String, ToolError> {
    let timezone = optional_string(args, "timezone", "UTC");
    let zone = timezone.parse::<Tz>().unwrap_or(chrono_tz::UTC);
    let local = now.with_timezone(&zone);

    Ok(format!(
        "Current time ({timezone}): {}\nTimestamp: {}\nFormatted: {}",
        local.to_rfc3339_opts(SecondsFormat::Secs, true),
        local.timestamp(),
        local.format("%A, %B %-d, %Y at %-I:%M %p %Z")
    ))
}

fn weather(args: &Arguments, updated: DateTime<Utc>) -> Result<String, ToolError> {
    let location = required_string(args, "location")?;
    Ok(format!(
        "Weather for {location}:\n\
         - Temperature: {:.1}°C\n\
         - Condition: Partly Cloudy\n\
         - Humidity: 65%\n\
         - Wind Speed: {:.1} km/h\n\
         - Pressure: {:.2} hPa\n\
         - Visibility: 10 km\n\
         - UV Index: 5\n\
         - Last Updated: {}",
        22.5,
        12.3,
        1013.25,
        updated.to_rfc3339_opts(SecondsFormat::Secs, true)
    ))
}

fn analyze_image(args: Arguments, _context: ToolExecutionContext) -> Result<String, ToolError> {
    required_string(&args, "image_data")?;
    let analysis_type = optional_string(&args, "analysis_type", "general");

    Ok(format!(
        "Image Analysis ({analysis_type}):\n\n\
         Objects Detected: person, car, building, tree\n\
         Dominant Colors: blue, green, gray, white\n\
         Text Found: Sample text found in image\n\
         Faces Detected: 2\n\
         Confidence: 0.95\n\
         Image Quality: high\n\
         Dimensions: 1920x1080\n"
    ))
}

fn translate_text(args: Arguments, _context: ToolExecutionContext) -> Result<String, ToolError> {
    let text = required_string(&args, "text")?;
    let target = required_string(&args, "target_language")?;
    let source = optional_string(&args, "source_language", "auto");

    Ok(format!(
        "Translation Result:\n\
         Source Language: {source}\n\
         Target Language: {target}\n\
         Original Text: {text}\n\
         Translated Text: [Translated to {target}] {text}\n\
         Confidence: 0.98"
    ))
}

fn analyze_document(args: Arguments, _context: ToolExecutionContext) -> Result<String, ToolError> {
    required_string(&args, "document_data")?;
    let document_type = optional_string(&args, "document_type", "pdf");

    Ok(format!(
        "Document Analysis:\n\
         - Type: {document_type}\n\
         - Pages: 15\n\
         - Words: 2847\n\
         - Language: English\n\
         - Topics: Technology, AI, Machine Learning\n\
         - Key Entities: OpenAI, GPT, Neural Networks\n\
         - Sentiment: Neutral\n\
         - Readability: Professional\n\
         - Contains Tables: true\n\
         - Contains Images: true"
    ))
}

fn generate_code(args: Arguments, _context: ToolExecutionContext) -> Result<String, ToolError> {
    let description = required_string(&args, "description")?;
    let language = optional_string(&args, "language", "javascript");

    let code = match language.to_lowercase().as_str() {
        "javascript" | "js" => format!(
            "// {description}\n\
             function generatedFunction() {{\n    \
             // Implementation for: {description}\n    \
             console.log('Generated function executed');\n    \
             return true;\n\
             }}\n\n\
             // Usage example\n\
             generatedFunction();"
        ),
        "python" | "py" => format!(
            "# {description}\n\
             def generated_function():\n    \
             \"\"\"Implementation for: {description}\"\"\"\n    \
             print('Generated function executed')\n    \
             return True\n\n\
             # Usage example\n\
             if __name__ == \"__main__\":\n    \
             generated_function()"
        ),
        "go" | "golang" => format!(
            "// {description}\n\
             package main\n\n\
             import \"fmt\"\n\n\
             // GeneratedFunction implements: {description}\n\
             func GeneratedFunction() bool {{\n    \
             fmt.Println(\"Generated function executed\")\n    \
             return true\n\
             }}\n\n\
             func main() {{\n    \
             GeneratedFunction()\n\
             }}"
        ),
        _ => format!(
            "// {description}\n\
             // Generated code for: {description}\n\
             // Language: {language}\n\n\
             // Implementation would go here"
        ),
    };

    Ok(format!(
        "Generated {language} code:\n\n```{language}\n{code}\n```"
    ))
}

fn format_data(args: Arguments, _context: ToolExecutionContext) -> Result<String, ToolError> {
    let data = required_string(&args, "data")?;
    let format = optional_string(&args, "format", "json");

    let formatted = match format.to_lowercase().as_str() {
        "json" => {
            let value: Value = serde_json::from_str(&data).map_err(|error| {
                ToolError::invalid_arguments(format!("invalid JSON data: {error}"))
                    .with_argument("data")
            })?;
            pretty_json(&value)?
        }
        "csv" => data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        "xml" => format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<data>\n  {data}\n</data>"
        ),
        _ => data,
    };

    Ok(format!(
        "Formatted data ({format}):\n\n```{format}\n{formatted}\n```"
    ))
}

/// Invalid input is a successful result describing the problem, not a tool failure.
fn validate_json(args: Arguments, _context: ToolExecutionContext) -> Result<String, ToolError> {
    let json_data = required_string(&args, "json_data")?;

    match serde_json::from_str::<Value>(&json_data) {
        Ok(value) => Ok(format!(
            "✅ Valid JSON:\n\n```json\n{}\n```",
            pretty_json(&value)?
        )),
        Err(error) => Ok(format!(
            "❌ Invalid JSON:\n{json_data}\n\nError: {error}"
        )),
    }
}

fn extract_text(args: Arguments, _context: ToolExecutionContext) -> Result<String, ToolError> {
    required_string(&args, "file_data")?;
    let file_type = optional_string(&args, "file_type", "pdf");

    Ok(format!(
        "Extracted text from {file_type} file:\n\n\
         This is sample extracted text content. In a real implementation, this would:\n\
         - Parse PDF files using libraries like pdfplumber or PyPDF2\n\
         - Extract text from images using OCR (Tesseract)\n\
         - Parse Word documents using python-docx\n\
         - Handle various file formats\n\n\
         The extracted content would preserve formatting and structure where possible.\n\n\
         File type: {file_type}\n\
         Extraction confidence: 95%\n\
         Character count: 1,247\n\
         Word count: 203"
    ))
}

fn pretty_json(value: &Value) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value)
        .map_err(|error| ToolError::execution(format!("failed to format JSON: {error}")))
}

fn string_param(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn string_param_with_default(description: &str, default: &str) -> Value {
    json!({"type": "string", "description": description, "default": default})
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    let mut schema = json!({"type": "object", "properties": properties});
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

fn full_declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration::new(
            WEB_SEARCH,
            "Search the web for current information and news",
            object_schema(
                json!({
                    "query": string_param("Search query to find information about"),
                    "num_results": {
                        "type": "integer",
                        "description": "Number of search results to return (default: 5, max: 10)",
                        "default": 5,
                        "minimum": 1,
                        "maximum": 10,
                    },
                }),
                &["query"],
            ),
        ),
        ToolDeclaration::new(
            CALCULATE,
            "Perform mathematical calculations and solve equations",
            object_schema(
                json!({"expression": string_param(
                    "Mathematical expression to calculate (supports +, -, *, /, parentheses, sqrt, sin, cos)",
                )}),
                &["expression"],
            ),
        ),
        ToolDeclaration::new(
            GET_CURRENT_TIME,
            "Get the current date and time in various formats",
            object_schema(
                json!({"timezone": string_param_with_default(
                    "Timezone (e.g., 'UTC', 'America/New_York', 'Asia/Tokyo')",
                    "UTC",
                )}),
                &[],
            ),
        ),
        ToolDeclaration::new(
            GET_WEATHER,
            "Get current weather information for a location",
            object_schema(
                json!({"location": string_param(
                    "City name, country, or coordinates for weather information",
                )}),
                &["location"],
            ),
        ),
        ToolDeclaration::new(
            ANALYZE_IMAGE,
            "Analyze images to detect objects, text, faces, and other features",
            object_schema(
                json!({
                    "image_data": string_param("Base64 encoded image data"),
                    "analysis_type": string_param_with_default(
                        "Type of analysis: 'general', 'text', 'faces', 'objects'",
                        "general",
                    ),
                }),
                &["image_data"],
            ),
        ),
        ToolDeclaration::new(
            TRANSLATE_TEXT,
            "Translate text between different languages",
            object_schema(
                json!({
                    "text": string_param("Text to translate"),
                    "target_language": string_param(
                        "Target language code (e.g., 'en', 'es', 'fr', 'de', 'ja', 'zh')",
                    ),
                    "source_language": string_param_with_default(
                        "Source language code (auto-detect if not specified)",
                        "auto",
                    ),
                }),
                &["text", "target_language"],
            ),
        ),
        ToolDeclaration::new(
            ANALYZE_DOCUMENT,
            "Analyze documents (PDF, Word, etc.) to extract insights and metadata",
            object_schema(
                json!({
                    "document_data": string_param("Base64 encoded document data"),
                    "document_type": string_param_with_default(
                        "Document type: 'pdf', 'docx', 'txt', 'rtf'",
                        "pdf",
                    ),
                }),
                &["document_data"],
            ),
        ),
        ToolDeclaration::new(
            GENERATE_CODE,
            "Generate code snippets in various programming languages",
            object_schema(
                json!({
                    "description": string_param("Description of what the code should do"),
                    "language": string_param_with_default(
                        "Programming language: 'javascript', 'python', 'go', 'java', 'cpp', 'rust'",
                        "javascript",
                    ),
                }),
                &["description"],
            ),
        ),
        ToolDeclaration::new(
            FORMAT_DATA,
            "Format and prettify data in various formats (JSON, CSV, XML)",
            object_schema(
                json!({
                    "data": string_param("Raw data to format"),
                    "format": string_param_with_default(
                        "Output format: 'json', 'csv', 'xml', 'yaml'",
                        "json",
                    ),
                }),
                &["data"],
            ),
        ),
        ToolDeclaration::new(
            VALIDATE_JSON,
            "Validate and prettify JSON data",
            object_schema(
                json!({"json_data": string_param("JSON string to validate and format")}),
                &["json_data"],
            ),
        ),
        ToolDeclaration::new(
            EXTRACT_TEXT,
            "Extract text content from various file formats",
            object_schema(
                json!({
                    "file_data": string_param("Base64 encoded file data"),
                    "file_type": string_param_with_default(
                        "File type: 'pdf', 'docx', 'txt', 'image'",
                        "pdf",
                    ),
                }),
                &["file_data"],
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{ToolErrorKind, parse_arguments};

    fn args(json: &str) -> Arguments {
        parse_arguments(json).expect("test arguments are objects")
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 15, 4, 5)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn tool_sets_expose_expected_names() {
        let names = |set: ToolSet| {
            set.declarations()
                .into_iter()
                .map(|declaration| declaration.name)
                .collect::<Vec<_>>()
        };

        assert_eq!(names(ToolSet::Chat), ToolSet::Chat.tool_names());
        assert_eq!(names(ToolSet::Search), vec![WEB_SEARCH]);
        assert_eq!(names(ToolSet::Full), ToolSet::Full.tool_names());
        assert_eq!(
            ToolSet::Search.declarations()[0].parameters["properties"]["num_results"]["default"],
            10
        );
        assert!(ToolSet::Chat.declarations()[2].parameters.get("required").is_none());
    }

    #[test]
    fn registry_holds_every_full_declaration() {
        let registry = builtin_registry().expect("built-ins register");

        assert_eq!(registry.declarations(), full_declarations());
        for name in ToolSet::Full.tool_names() {
            assert!(registry.contains(name), "{name}");
        }
    }

    #[test]
    fn web_search_caps_results_and_dates_them() {
        let text = web_search(&args(r#"{"query":"rust","num_results":10}"#), fixed_now())
            .expect("search succeeds");

        assert!(text.starts_with("Search results for 'rust':\n\n1. **Search result for: rust**\n"));
        assert!(text.contains("3. **Complete guide to rust**\n   URL: https://guide.example.com/topic\n"));
        assert!(text.contains("   Published: 2024-03-05\n"));
        assert!(text.contains("   Published: 2024-03-03\n\n"));
        assert!(!text.contains("4. "));

        let one = web_search(&args(r#"{"query":"rust","num_results":1}"#), fixed_now())
            .expect("search succeeds");
        assert!(!one.contains("2. "));
    }

    #[test]
    fn calculate_formats_result_and_wraps_errors() {
        let calculator = Calculator::new().expect("patterns compile");

        assert_eq!(
            calculate(&calculator, &args(r#"{"expression":"(2 + 3) * 4"}"#)).expect("valid"),
            "Calculation: (2 + 3) * 4 = 20"
        );

        let error = calculate(&calculator, &args(r#"{"expression":"10/0"}"#))
            .expect_err("division by zero");
        assert_eq!(error.kind, ToolErrorKind::DivisionByZero);
        assert_eq!(
            error.message,
            "failed to calculate expression '10/0': division by zero"
        );

        let error = calculate(&calculator, &args("{}")).expect_err("missing expression");
        assert_eq!(error.argument.as_deref(), Some("expression"));
    }

    #[test]
    fn current_time_converts_known_zones_and_labels_unknown_ones() {
        let tokyo = current_time(&args(r#"{"timezone":"Asia/Tokyo"}"#), fixed_now())
            .expect("time succeeds");
        assert_eq!(
            tokyo,
            "Current time (Asia/Tokyo): 2024-03-06T00:04:05+09:00\n\
             Timestamp: 1709651045\n\
             Formatted: Wednesday, March 6, 2024 at 12:04 AM JST"
        );

        let fallback = current_time(&args(r#"{"timezone":"Mars/Olympus"}"#), fixed_now())
            .expect("time succeeds");
        assert!(fallback.starts_with("Current time (Mars/Olympus): 2024-03-05T15:04:05Z\n"));
        assert!(fallback.ends_with("Tuesday, March 5, 2024 at 3:04 PM UTC"));
    }

    #[test]
    fn weather_and_translation_follow_fixed_templates() {
        let weather = weather(&args(r#"{"location":"Oslo"}"#), fixed_now()).expect("weather");
        assert!(weather.starts_with("Weather for Oslo:\n- Temperature: 22.5°C\n"));
        assert!(weather.contains("- Humidity: 65%\n"));
        assert!(weather.contains("- Pressure: 1013.25 hPa\n"));
        assert!(weather.ends_with("- Last Updated: 2024-03-05T15:04:05Z"));

        let translated = translate_text(
            args(r#"{"text":"hello","target_language":"es"}"#),
            ToolExecutionContext::new("s"),
        )
        .expect("translation");
        assert!(translated.contains("Source Language: auto\n"));
        assert!(translated.contains("Translated Text: [Translated to es] hello\n"));

        let error = translate_text(args(r#"{"text":"hello"}"#), ToolExecutionContext::new("s"))
            .expect_err("target required");
        assert_eq!(error.argument.as_deref(), Some("target_language"));
    }

    #[test]
    fn format_data_pretty_prints_json_and_cleans_csv() {
        let json = format_data(args(r#"{"data":"{\"b\":1,\"a\":[true]}"}"#), ToolExecutionContext::new("s"))
            .expect("json formats");
        assert_eq!(
            json,
            "Formatted data (json):\n\n```json\n{\n  \"a\": [\n    true\n  ],\n  \"b\": 1\n}\n```"
        );

        let csv = format_data(
            args(r#"{"data":"  a,b \n\n 1,2 ","format":"csv"}"#),
            ToolExecutionContext::new("s"),
        )
        .expect("csv formats");
        assert_eq!(csv, "Formatted data (csv):\n\n```csv\na,b\n1,2\n```");

        let error = format_data(args(r#"{"data":"{oops"}"#), ToolExecutionContext::new("s"))
            .expect_err("invalid json");
        assert_eq!(error.kind, ToolErrorKind::InvalidArguments);
    }

    #[test]
    fn validate_json_reports_invalid_input_as_text() {
        let valid = validate_json(args(r#"{"json_data":"[1]"}"#), ToolExecutionContext::new("s"))
            .expect("valid");
        assert_eq!(valid, "✅ Valid JSON:\n\n```json\n[\n  1\n]\n```");

        let invalid = validate_json(args(r#"{"json_data":"[1"}"#), ToolExecutionContext::new("s"))
            .expect("invalid input is still a result");
        assert!(invalid.starts_with("❌ Invalid JSON:\n[1\n\nError: "));
    }

    #[test]
    fn generate_code_picks_language_template() {
        let python = generate_code(
            args(r#"{"description":"sum numbers","language":"Python"}"#),
            ToolExecutionContext::new("s"),
        )
        .expect("code");
        assert!(python.starts_with("Generated Python code:\n\n```Python\n# sum numbers\ndef generated_function():\n"));

        let other = generate_code(
            args(r#"{"description":"sum numbers","language":"rust"}"#),
            ToolExecutionContext::new("s"),
        )
        .expect("code");
        assert!(other.contains("// Language: rust\n"));
    }
}
