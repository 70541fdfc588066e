mod detector_tests;
mod pipeline_integration;
