pub mod ffmpeg_camera;
pub mod image_file;
pub mod synthetic_camera;
