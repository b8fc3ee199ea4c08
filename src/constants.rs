/// Column names the transformer rewrites. Every other column passes through untouched.
pub const NAME_COLUMN: &str = "Name";
pub const ADMISSION_DATE_COLUMN: &str = "Date of Admission";
pub const DISCHARGE_DATE_COLUMN: &str = "Discharge Date";

/// Date columns parsed as day-first `DD/MM/YYYY`
pub const DATE_COLUMNS: [&str; 2] = [ADMISSION_DATE_COLUMN, DISCHARGE_DATE_COLUMN];

// Defaults used when neither the config file nor the environment sets a value
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "healthcare_db";
pub const DEFAULT_COLLECTION: &str = "patients";
pub const DEFAULT_INPUT_DIR: &str = "data";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "etl.log";
pub const DEFAULT_CONFIG_FILE: &str = "loader.toml";
pub const DEFAULT_DELIMITER: char = ';';
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// Environment variable overrides
pub const ENV_MONGO_URI: &str = "MONGO_URI";
pub const ENV_MONGO_DATABASE: &str = "MONGO_DATABASE";
pub const ENV_MONGO_COLLECTION: &str = "MONGO_COLLECTION";
pub const ENV_INPUT_DIR: &str = "ETL_INPUT_DIR";
pub const ENV_LOG_DIR: &str = "ETL_LOG_DIR";
