//! Business logic services for the site.
//!
//! # Services
//!
//! - `auth` - Password and Google sign-in, password resets, profiles
//! - `comments` - Threaded comment paging and reply loading
//! - `poems` - Cached poem listings
//! - `requests` - Poem submissions and admin review
//! - `mail` - External mail service client
//! - `contact` - Contact form relay
//! - `google` - Google OAuth 2.0 client

pub mod auth;
pub mod comments;
pub mod contact;
pub mod google;
pub mod mail;
pub mod poems;
pub mod requests;
