/// User-facing strings and fixed policy values of the Testsigma build step.
pub struct StepMessages;

impl StepMessages {
    pub const DISPLAY_NAME: &'static str = "Testsigma Test Plan run";

    /// Minutes between two status checks. Fixed policy, not configurable.
    pub const POLLING_INTERVAL_MINUTES: u64 = 5;

    pub const INVALID_TEST_PLAN_ID: &'static str = "Testsigma TestPlan Id cannot be empty";
    pub const INVALID_API_END_POINT: &'static str = "Testsigma API endpoint cannot be empty";
    pub const MALFORMED_API_END_POINT: &'static str =
        "Testsigma API endpoint must be an http(s) URL";
    pub const INVALID_API_KEY: &'static str = "Testsigma API key cannot be empty";
    pub const INVALID_NUMBER: &'static str = "Please enter a valid number";
    pub const ENTER_GREATER_THAN_ZERO: &'static str =
        "Please enter a value greater than or equal to zero";
    pub const MAX_WAIT_TOO_LARGE: &'static str = "Max wait time is too large";
    pub const INVALID_REPORT_FILE_NAME: &'static str = "Report file path cannot be empty";

    pub const START_BANNER: &'static str =
        "************Started Testsigma Testplan execution*************";
    pub const END_BANNER: &'static str =
        "************Completed Testsigma Testsuite execution*************";
    pub const UNABLE_TO_START: &'static str = "Unable to start Testsigma test plan execution.";
    pub const NOT_COMPLETED: &'static str = "Test Plan execution not completed, please increase \
         wait time OR visit https://app.testsigma.com for test plan execution results.";
}
