pub mod app_config;
pub mod dashboard;
pub mod db;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod middleware;
pub mod moderation;
pub mod notice;
pub mod notify;
pub mod orm;
pub mod processing;
pub mod realtime;
pub mod rpc;
pub mod session;
pub mod storage;
pub mod upload;
pub mod views;
pub mod web;
