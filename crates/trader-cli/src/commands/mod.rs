//! CLI 명령어 모듈.

pub mod replay;
