//! KYC Gateway Library
//!
//! This library provides the core functionality of the KYC onboarding API:
//! volatile sessions, document and selfie uploads, the OCR + LLM document
//! extraction pipeline, a placeholder match heuristic and rule-based risk
//! scoring.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Scoring logic, models and errors.
//! - `integrations`: External engines (Tesseract, OpenAI).
//! - `biometric`: File-hash match placeholder.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `llm`: Field extraction (OpenAI or regex fallback).
//! - `models`: Session state and request/response models.
//! - `ocr`: Text recognition.
//! - `pipeline`: OCR -> extraction -> confidence blend.
//! - `risk`: Risk scoring.
//! - `routes`: Router construction.
//! - `session_store`: In-memory session store.
//! - `storage`: Upload persistence on local disk.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod biometric;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod risk;
pub mod routes;
pub mod session_store;
pub mod storage;
