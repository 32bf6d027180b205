pub mod detector_factory;
pub mod onnx_yolo_detector;
pub mod scripted_detector;
