//! Parkline Lead Capture Library
//!
//! This library provides the lead capture backend for the Parkline residences
//! site: apartment attribute extraction, contact validation, the lead
//! submission pipeline (Bitrix24 CRM mirror, Postgres store, sync audit log),
//! the per-form submission controller, and the HTTP handlers.
//!
//! # Modules
//!
//! - `api`: HTTP-layer components.
//! - `core`: Domain logic, models and errors.
//! - `integrations`: External service clients (Bitrix24, Postgres).
//! - `attributes`: Apartment attribute bag and fact extraction.
//! - `validation`: Contact form validation.
//! - `pipeline`: Lead submission pipeline.
//! - `lead_form`: Form submission state machine.
//! - `i18n`: Localized form strings (mk, en, sq).
//! - `settings`: Persisted operator settings.

pub mod api;
pub mod core;
pub mod integrations;

pub mod admin_handler;
pub mod attributes;
pub mod bitrix_client;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod i18n;
pub mod lead_form;
pub mod lead_store;
pub mod models;
pub mod pipeline;
pub mod settings;
pub mod validation;
