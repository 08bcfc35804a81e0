//! This crate provides the building blocks [Apache RocketMQ](http://rocketmq.apache.org) clients use to name stored
//! messages and to deliver the outcome of request-reply calls.
pub mod callback;
pub mod config;
pub mod error;
pub mod message;
pub mod message_id;
pub mod request;
