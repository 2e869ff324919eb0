pub mod compare;
pub mod dataset;
pub mod duck;
pub mod eval;
pub mod llm;
pub mod mcp;
pub mod table;
