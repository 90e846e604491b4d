pub mod music_service;
