//! # CertLab - Certificate Lifecycle Toolkit
//!
//! CertLab parses, generates, signs, verifies and remotely inspects X.509
//! certificates, and probes which TLS protocol versions a server accepts.
//! Certificate and key handling is built on the RustCrypto crates; live
//! connections go through `rustls`.
//!
//! Every operation is synchronous, takes a plain options record and returns
//! a value object or a [`error::CertLabError`]. Nothing here prints, prompts
//! or exits; that is left to whatever front end drives the library.
//!
//! ## Components
//!
//! - [`san`]: classifies `IP:`/`email:`/`uri:`-prefixed SAN strings
//! - [`cert`]: the [`cert::Certificate`] value object, PEM/DER detection, conversion
//! - [`generate`]: self-signed server and CA certificates
//! - [`csr`]: signing request generation and parsing
//! - [`sign`]: issuing leaf certificates from requests with a local CA
//! - [`verify`]: validity window, hostname and chain checks
//! - [`remote`]: fetching the certificates a live server presents
//! - [`tls`]: per-version protocol support probing
//! - [`json`]: serializable projections of all of the above
//!
//! ## Quick Start
//!
//! ### A CA and a signed leaf
//!
//! ```rust,no_run
//! use certlab::csr::{CsrOptions, generate_csr};
//! use certlab::generate::{CaOptions, generate_ca};
//! use certlab::sign::{SignOptions, sign_csr};
//!
//! # fn main() -> certlab::error::Result<()> {
//! let ca = generate_ca(&CaOptions::builder().common_name("Test CA").output_dir("pki").build())?;
//!
//! let csr = generate_csr(
//!     &CsrOptions::builder()
//!         .common_name("test.example.com")
//!         .sans(vec!["test.example.com".into(), "www.test.example.com".into()])
//!         .output_dir("pki")
//!         .build(),
//! )?;
//!
//! let signed = sign_csr(
//!     &SignOptions::builder()
//!         .csr_path(&csr.csr_path)
//!         .ca_cert(&ca.cert_path)
//!         .ca_key(&ca.key_path)
//!         .output_dir("pki")
//!         .build(),
//! )?;
//! assert_eq!(signed.certificate.issuer().common_name, "Test CA");
//! # Ok(())
//! # }
//! ```
//!
//! ### Inspecting a server
//!
//! ```rust,no_run
//! use certlab::json::ToJson;
//! use certlab::remote::{InspectOptions, inspect_url};
//!
//! # fn main() -> certlab::error::Result<()> {
//! let inspection = inspect_url(&InspectOptions::builder().target("example.com").build())?;
//! println!("{}", inspection.to_json_string()?);
//! # Ok(())
//! # }
//! ```

pub mod cert;
pub mod csr;
pub mod error;
pub mod generate;
pub mod issuer;
pub mod json;
pub mod key;
pub mod output;
pub mod pem_utils;
pub mod remote;
pub mod san;
pub mod sign;
pub mod tbs_certificate;
pub mod tls;
pub mod verify;
