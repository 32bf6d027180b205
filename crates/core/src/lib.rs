//! Live face tracking: capture, detection, recognition, tracking and
//! throttled alerting over a bounded, recency-first pipeline.

pub mod capture {
    pub mod domain {
        pub mod camera_device;
    }
    pub mod frame_source;
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod face_detector;
        pub mod non_max_suppression;
    }
    pub mod infrastructure;
}

pub mod recognition {
    pub mod domain {
        pub mod embedding;
        pub mod face_embedder;
        pub mod gallery;
        pub mod gallery_store;
        pub mod matcher;
    }
    pub mod infrastructure;
}

pub mod tracking {
    pub mod domain {
        pub mod alert;
        pub mod alert_gate;
        pub mod track;
        pub mod tracker;
    }
}

pub mod pipeline {
    pub mod enroll_face_use_case;
    pub mod event_sink;
    pub mod events;
    pub mod infrastructure;
    pub mod manage_gallery_use_case;
    pub mod pipeline_executor;
    pub mod pipeline_stats;
    pub mod recognize_frame_use_case;
    pub mod refresh_gallery_use_case;
    pub mod snapshot;
}

pub mod shared {
    pub mod bounding_box;
    pub mod cancellation;
    pub mod config;
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod onnx_session;
    pub mod recency_queue;
    pub mod stream_info;
}
