/*!
# Sheetboard

A demonstration spreadsheet-upload and dashboard backend, built in Rust.

## Overview

Sheetboard is a consolidation of a demo web application whose original form
was several near-duplicate HTTP servers over in-memory arrays. This crate
keeps the demo semantics (mock authentication, simulated file processing,
hand-written analytics fixtures) but serves them from a single coherent
axum service with one response envelope.

Nothing is persisted: users, sessions, and sheet metadata live in process
memory and vanish on restart. Uploaded file bytes are written to the upload
directory, but their content is never parsed; "processing" is a fixed-delay
timer that fills in random row/column counts.

## Modules

- **config**: environment-variable driven settings
- **auth**: mock users, tokens, sessions, and the bearer-auth middleware
- **profile**: the authenticated `/api/users/profile` endpoints
- **sheets**: upload validation, sheet metadata CRUD, simulated processing
- **paging**: shared pagination for list endpoints
- **analytics**: fixture-backed summaries, insights, and chart placeholders
- **processed**: deterministic mock rows with CSV/JSON export
- **app**: state, routing, and the server entry point

## REST API Endpoints

- `/api/auth/{register,login,logout,refresh}` - mock authentication
- `/api/users/profile` - profile read/update (bearer token required)
- `/api/sheets` - upload and paginated listing; `/api/sheets/:id` - get/delete
- `/api/analytics/:id` (+ `/insights`, `/charts`) - mock analytics
- `/api/processed-data/:id` - paginated mock rows
- `/api/processed-data/:id/export?format=csv|json|pdf` - export
- `/api/health` - liveness
*/

pub mod analytics;
pub mod app;
pub mod auth;
pub mod config;
pub mod paging;
pub mod processed;
pub mod profile;
pub mod sheets;

/// Re-export everything from these modules to make it easier to use
pub use analytics::*;
pub use app::*;
pub use auth::*;
pub use config::*;
pub use paging::*;
pub use processed::*;
pub use profile::*;
pub use sheets::*;
