pub mod scenario_json;

pub use scenario_json::{
    archive_json, build_table_json, compare_json, create_draft_json, diff_json,
    save_as_current_json, update_draft_json, ApiError, ApiResponse, API_VERSION,
};
