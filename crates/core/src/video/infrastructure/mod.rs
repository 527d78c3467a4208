pub mod ffmpeg_source;
pub mod image_file_source;
pub mod source_factory;
pub mod yt_dlp_resolver;
