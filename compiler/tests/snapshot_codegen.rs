// Snapshot tests: lock formatted C++ output to detect unintended changes.
//
// Uses the library API (load → validate → generate → format) directly on the
// documents under `demos/` and on hand-built trees.
//
// Run `cargo insta review` after intentional output changes to update the
// inline baselines.

use std::path::{Path, PathBuf};

use usidc::backend::Backend;
use usidc::codegen::{generate, CodegenOptions};
use usidc::usid::Computation;

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn load_demo(name: &str) -> String {
    let path = project_root().join("demos").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

fn cpp(root: &Computation, backend: Backend) -> String {
    let options = CodegenOptions {
        backend,
        ..CodegenOptions::default()
    };
    generate(root, &options).unwrap().cpp_source
}

#[test]
fn snapshot_empty_gpu() {
    let out = cpp(&Computation::new("empty"), Backend::GPU);
    insta::assert_snapshot!(out, @r###"
    #include <gridtools/usid/dim.hpp>
    #include <gridtools/usid/helpers.hpp>
    #include <gridtools/usid/cuda_helpers.hpp>
    #ifndef __CUDACC__
    #error "Tried to compile CUDA code with a regular C++ compiler."
    #endif

    namespace empty_impl_ {
    using namespace gridtools;
    using namespace gridtools::usid;
    using namespace gridtools::usid::cuda;

    inline constexpr auto empty = [](domain d) {
      return [d = std::move(d)]() {
      };
    };
    } // namespace empty_impl_

    using empty_impl_::empty;
    "###);
}

#[test]
fn snapshot_empty_naive() {
    let out = cpp(&Computation::new("empty"), Backend::NAIVE);
    insta::assert_snapshot!(out, @r###"
    #include <gridtools/usid/dim.hpp>
    #include <gridtools/usid/helpers.hpp>
    #include <gridtools/usid/naive_helpers.hpp>

    namespace empty_impl_ {
    using namespace gridtools;
    using namespace gridtools::usid;
    using namespace gridtools::usid::naive;

    inline constexpr auto empty = [](domain d) {
      return [d = std::move(d)]() {
      };
    };
    } // namespace empty_impl_

    using empty_impl_::empty;
    "###);
}

#[test]
fn snapshot_neighbor_sum() {
    let root = usidc::pipeline::load_usid(&load_demo("nbsum.usid.json")).unwrap();
    let out = cpp(&root, Backend::NAIVE);
    insta::assert_snapshot!(out, @r###"
    #include <gridtools/usid/dim.hpp>
    #include <gridtools/usid/helpers.hpp>
    #include <gridtools/usid/naive_helpers.hpp>

    namespace nbsum_impl_ {
    using namespace gridtools;
    using namespace gridtools::usid;
    using namespace gridtools::usid::naive;

    struct e2v_tag : connectivity<2, false> {};
    struct in_tag;
    struct out_tag;

    struct sum_kernel {
      GT_FUNCTION auto operator()() const {
        return [](auto &&e_ptrs, auto &&e_strides, auto &&v) {
          double acc = (double)0;
          foreach_neighbor<e2v_tag>([&](auto &&p, auto &&n) {
            acc = (acc + field<in_tag>(n));
          }, e_ptrs, e_strides, v);
          field<out_tag>(e_ptrs) = acc;
        };
      }
    };

    inline constexpr auto nbsum = [](domain d, auto &&e2v) {
      return [d = std::move(d), e2v = sid::rename_dimensions<dim::n, e2v_tag>(std::forward<decltype(e2v)>(e2v)(traits_t()))](auto &&in_field, auto &&out_field) {
        call_kernel<sum_kernel>(d.edge, sid::composite::make<out_tag, e2v_tag>(out_field, e2v), sid::composite::make<in_tag>(in_field));
      };
    };
    } // namespace nbsum_impl_

    using nbsum_impl_::nbsum;
    "###);
}
