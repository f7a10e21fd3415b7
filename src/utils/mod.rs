pub mod extract;
pub mod ocr;
pub mod pdf;
pub mod summarizer;
pub mod upload;
