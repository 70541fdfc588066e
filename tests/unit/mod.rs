mod revision_view_tests;
mod scanner_tests;
mod xref_chain_tests;
