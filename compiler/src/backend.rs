// backend.rs — Target backend configuration
//
// Backends differ only in data: extra headers, the namespace segment that
// selects the runtime's helper implementation, and a preface emitted right
// after the includes. All generation logic is shared.

/// Headers every translation unit includes, before the backend's own.
pub const BASE_HEADERS: &[&str] = &["<gridtools/usid/dim.hpp>", "<gridtools/usid/helpers.hpp>"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backend {
    /// Name used on the command line and in build info.
    pub name: &'static str,
    pub extra_headers: &'static [&'static str],
    /// Segment of `gridtools::usid::<namespace>` brought into scope.
    pub namespace: &'static str,
    pub preface: &'static str,
}

impl Backend {
    /// Single-threaded host backend.
    pub const NAIVE: Backend = Backend {
        name: "naive",
        extra_headers: &["<gridtools/usid/naive_helpers.hpp>"],
        namespace: "naive",
        preface: "",
    };

    pub const GPU: Backend = Backend {
        name: "gpu",
        extra_headers: &["<gridtools/usid/cuda_helpers.hpp>"],
        namespace: "cuda",
        preface: "#ifndef __CUDACC__\n\
                  #error \"Tried to compile CUDA code with a regular C++ compiler.\"\n\
                  #endif",
    };

    pub const ALL: [Backend; 2] = [Backend::NAIVE, Backend::GPU];

    pub fn by_name(name: &str) -> Option<Backend> {
        Backend::ALL.into_iter().find(|b| b.name == name)
    }

    /// Base headers followed by the backend's extras.
    pub fn headers(&self) -> impl Iterator<Item = &'static str> + '_ {
        BASE_HEADERS.iter().chain(self.extra_headers).copied()
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::NAIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_preface_is_a_compiler_guard() {
        let lines: Vec<&str> = Backend::GPU.preface.lines().collect();
        assert_eq!(
            lines,
            vec![
                "#ifndef __CUDACC__",
                "#error \"Tried to compile CUDA code with a regular C++ compiler.\"",
                "#endif",
            ]
        );
        assert!(Backend::NAIVE.preface.is_empty());
    }

    #[test]
    fn headers_start_with_base_set() {
        let headers: Vec<&str> = Backend::GPU.headers().collect();
        assert_eq!(
            headers,
            vec![
                "<gridtools/usid/dim.hpp>",
                "<gridtools/usid/helpers.hpp>",
                "<gridtools/usid/cuda_helpers.hpp>",
            ]
        );
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(Backend::by_name("gpu"), Some(Backend::GPU));
        assert_eq!(Backend::by_name("naive"), Some(Backend::NAIVE));
        assert_eq!(Backend::by_name("sycl"), None);
    }
}
