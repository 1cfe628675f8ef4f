use std::cell::RefCell;
use std::rc::Rc;

use glam::{uvec2, vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::backends::cpu::{CpuBackend, CpuImage, CpuResource};
use crate::Kernels;

type Graph = FrameGraph<CpuBackend>;

fn desc() -> ImageDesc {
    ImageDesc::new(uvec2(2, 2), wgpu::TextureFormat::Rgba16Float)
}

fn image(name: &str) -> CpuResource {
    CpuImage::new(name, uvec2(2, 2), wgpu::TextureFormat::Rgba16Float).into()
}

fn import(graph: &mut Graph, name: &str) -> Handle<Image> {
    graph.import_image(name, image(name), desc())
}

/// Records a pass that does nothing, besides declaring given accesses.
fn pass(
    graph: &mut Graph,
    name: &str,
    reads: &[Handle<Image>],
    writes: &[Handle<Image>],
) {
    let mut pass = graph.add_pass(name);

    for &handle in reads {
        pass.read(handle);
    }

    for &handle in writes {
        pass.write(handle);
    }

    pass.execute(|_| Ok(()));
}

#[test]
fn reads_see_preceding_writes() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");
    let tex = graph.create_image("tex", desc());

    pass(&mut graph, "a", &[], &[tex]);
    pass(&mut graph, "b", &[tex], &[out]);

    let target = graph.compile().unwrap();

    assert_eq!(vec!["a", "b"], target.schedule());
    assert!(target.culled().is_empty());
}

#[test]
fn reads_before_writes_bind_to_later_writer() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");
    let tex = graph.create_image("tex", desc());

    pass(&mut graph, "reader", &[tex], &[out]);
    pass(&mut graph, "writer", &[], &[tex]);

    let target = graph.compile().unwrap();

    assert_eq!(vec!["writer", "reader"], target.schedule());
}

#[test]
fn writes_wait_for_readers_of_previous_version() {
    let mut graph = Graph::new();
    let history = import(&mut graph, "history");
    let out_a = import(&mut graph, "out_a");
    let out_b = import(&mut graph, "out_b");

    pass(&mut graph, "read_old", &[history], &[out_a]);
    pass(&mut graph, "overwrite", &[], &[history]);
    pass(&mut graph, "read_new", &[history], &[out_b]);

    let target = graph.compile().unwrap();

    assert_eq!(vec!["read_old", "overwrite", "read_new"], target.schedule());
}

#[test]
fn consecutive_writes_keep_submission_order() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");

    pass(&mut graph, "first", &[], &[out]);
    pass(&mut graph, "second", &[], &[out]);
    pass(&mut graph, "third", &[], &[out]);

    let target = graph.compile().unwrap();

    assert_eq!(vec!["first", "second", "third"], target.schedule());
}

#[test]
fn unread_transients_are_culled() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");
    let a = graph.create_image("a", desc());
    let b = graph.create_image("b", desc());

    pass(&mut graph, "write_a", &[], &[a]);
    pass(&mut graph, "a_to_b", &[a], &[b]);
    pass(&mut graph, "present", &[], &[out]);

    let target = graph.compile().unwrap();

    assert_eq!(vec!["present"], target.schedule());
    assert_eq!(vec!["write_a", "a_to_b"], target.culled());
    assert_eq!(None, target.physical_slot(a));
    assert_eq!(0, target.slot_count());
}

#[test]
fn pinned_passes_are_never_culled() {
    let mut graph = Graph::new();
    let tex = graph.create_image("tex", desc());

    pass(&mut graph, "write", &[], &[tex]);

    let mut debug = graph.add_pass("debug");

    debug.read(tex);
    debug.pin();
    debug.execute(|_| Ok(()));

    let target = graph.compile().unwrap();

    assert_eq!(vec!["write", "debug"], target.schedule());
}

#[test]
fn missing_writer() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");
    let tex = graph.create_image("tex", desc());

    pass(&mut graph, "reader", &[tex], &[out]);

    let err = graph.compile().unwrap_err();

    assert!(matches!(
        err,
        Error::MissingWriter { pass, resource }
            if pass == "reader" && resource == "tex"
    ));
}

#[test]
fn missing_writer_of_read_write() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");
    let tex = graph.create_image("tex", desc());

    let mut accumulate = graph.add_pass("accumulate");

    accumulate.read_write(tex);
    accumulate.execute(|_| Ok(()));

    pass(&mut graph, "consumer", &[tex], &[out]);

    let err = graph.compile().unwrap_err();

    assert!(matches!(
        err,
        Error::MissingWriter { pass, resource }
            if pass == "accumulate" && resource == "tex"
    ));
}

#[test]
fn writes_to_external_resources_are_live() {
    let mut graph = Graph::new();
    let back_buffer = import(&mut graph, "back_buffer");
    let tex = graph.create_image("tex", desc());

    pass(&mut graph, "clear", &[], &[back_buffer]);
    pass(&mut graph, "unused", &[], &[tex]);

    let target = graph.compile().unwrap();

    assert_eq!(vec!["clear"], target.schedule());
    assert_eq!(vec!["unused"], target.culled());
}

#[test]
fn cycle() {
    let mut graph = Graph::new();
    let t1 = graph.create_image("t1", desc());
    let t2 = graph.create_image("t2", desc());

    pass(&mut graph, "a", &[t1], &[t2]);
    pass(&mut graph, "b", &[t2], &[t1]);

    let err = graph.compile().unwrap_err();

    assert!(matches!(
        err,
        Error::Cycle { first, second, resource }
            if first == "a" && second == "b" && resource == "t2"
    ));
}

#[test]
fn foreign_handle() {
    let mut other = Graph::new();
    let foreign = import(&mut other, "foreign");

    let mut graph = Graph::new();
    let out = import(&mut graph, "out");

    pass(&mut graph, "reader", &[foreign], &[out]);

    let err = graph.compile().unwrap_err();

    assert!(matches!(
        err,
        Error::ForeignHandle { pass, .. } if pass == "reader"
    ));

    assert!(other.image_desc(out).is_err());
}

#[test]
fn aliasing() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");
    let a = graph.create_image("a", desc());
    let b = graph.create_image("b", desc());
    let c = graph.create_image("c", desc().with_size(uvec2(4, 4)));

    pass(&mut graph, "write_a", &[], &[a]);
    pass(&mut graph, "read_a", &[a], &[out]);
    pass(&mut graph, "write_b", &[], &[b]);
    pass(&mut graph, "read_b", &[b], &[out]);
    pass(&mut graph, "write_c", &[], &[c]);
    pass(&mut graph, "read_c", &[c], &[out]);

    let target = graph.compile().unwrap();

    assert_eq!(Some(0), target.physical_slot(a));
    assert_eq!(Some(0), target.physical_slot(b));
    assert_eq!(Some(1), target.physical_slot(c));
    assert_eq!(2, target.slot_count());

    let mut backend = CpuBackend::new();
    let report = target.execute(&mut backend).unwrap();

    assert_eq!(2, report.physical_allocations);
    assert_eq!(2, backend.stats().allocations);
    assert_eq!(1, backend.stats().peak);
    assert_eq!(0, backend.stats().live());
}

#[test]
fn overlapping_transients_get_separate_slots() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");
    let a = graph.create_image("a", desc());
    let b = graph.create_image("b", desc());

    pass(&mut graph, "write_a", &[], &[a]);
    pass(&mut graph, "write_b", &[], &[b]);
    pass(&mut graph, "combine", &[a, b], &[out]);

    let target = graph.compile().unwrap();

    assert_eq!(2, target.slot_count());
    assert_ne!(target.physical_slot(a), target.physical_slot(b));
}

#[test]
fn execution() {
    let mut graph = Graph::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let source: CpuResource = CpuImage::from_fn(
        "source",
        uvec2(2, 2),
        wgpu::TextureFormat::Rgba16Float,
        |pos| vec4(pos.x as f32, pos.y as f32, 0.5, 1.0),
    )
    .into();

    let out_res = image("out");
    let source = graph.import_image("source", source, desc());
    let out = graph.import_image("out", out_res.clone(), desc());
    let tmp = graph.create_image("tmp", desc());

    // Recorded out of order on purpose
    let mut present = graph.add_pass("present");

    present.read(tmp);
    present.write(out);
    present.execute({
        let log = log.clone();

        move |ctx| {
            log.borrow_mut().push(ctx.name().to_owned());

            let tmp = ctx.read(tmp)?;
            let out = ctx.write(out)?;

            ctx.backend().copy(&tmp, &out)
        }
    });

    let mut fill = graph.add_pass("fill");

    fill.read(source);
    fill.write(tmp);
    fill.execute({
        let log = log.clone();

        move |ctx| {
            log.borrow_mut().push(ctx.name().to_owned());

            let source = ctx.read(source)?;
            let tmp = ctx.write(tmp)?;

            ctx.backend().copy(&source, &tmp)
        }
    });

    let mut backend = CpuBackend::new();
    let report = graph.compile().unwrap().execute(&mut backend).unwrap();

    assert_eq!(vec!["fill", "present"], *log.borrow());

    assert_eq!(
        ExecutionReport {
            executed: vec!["fill".into(), "present".into()],
            culled: vec![],
            physical_allocations: 1,
        },
        report
    );

    assert_eq!(
        vec4(1.0, 1.0, 0.5, 1.0),
        out_res.image().unwrap().get(uvec2(1, 1))
    );

    assert_eq!(0, backend.stats().live());
}

#[test]
fn read_write() {
    let mut graph = Graph::new();

    let history_res: CpuResource = CpuImage::from_fn(
        "history",
        uvec2(2, 2),
        wgpu::TextureFormat::Rgba16Float,
        |_| vec4(0.25, 0.25, 0.25, 0.0),
    )
    .into();

    let history = graph.import_image("history", history_res.clone(), desc());
    let mut pass = graph.add_pass("seed");

    pass.read_write(history);
    pass.execute(move |ctx| {
        let input = ctx.read(history)?;
        let output = ctx.write(history)?;

        ctx.backend().seed_history(&input, &output)
    });

    let mut backend = CpuBackend::new();

    graph.compile().unwrap().execute(&mut backend).unwrap();

    assert_eq!(
        vec4(0.25, 0.25, 0.25, 1.0),
        history_res.image().unwrap().get(uvec2(0, 0))
    );
}

#[test]
fn undeclared_access() {
    let mut graph = Graph::new();
    let source = import(&mut graph, "source");
    let out = import(&mut graph, "out");

    let mut pass = graph.add_pass("sneaky");

    pass.read(source);
    pass.write(out);
    pass.execute(move |ctx| {
        // Declared as read only
        ctx.write(source)?;
        Ok(())
    });

    let mut backend = CpuBackend::new();
    let err = graph.compile().unwrap().execute(&mut backend).unwrap_err();

    assert!(matches!(
        &err,
        Error::PassFailed { pass, .. } if pass == "sneaky"
    ));

    assert!(matches!(
        err.root(),
        Error::UndeclaredAccess { pass, resource }
            if pass == "sneaky" && resource == "source"
    ));
}

#[test]
fn failures_release_transients() {
    let mut graph = Graph::new();
    let out = import(&mut graph, "out");

    let mut pass = graph.add_pass("fill");
    let tmp = pass.create_image("tmp", desc());

    pass.execute(|_| Ok(()));

    let mut pass = graph.add_pass("fail");

    pass.read(tmp);
    pass.write(out);
    pass.execute(|_| {
        Err(Error::SizeMismatch {
            expected: uvec2(1, 1),
            actual: uvec2(2, 2),
        })
    });

    let mut backend = CpuBackend::new();
    let err = graph.compile().unwrap().execute(&mut backend).unwrap_err();

    assert!(matches!(err.root(), Error::SizeMismatch { .. }));
    assert_eq!(1, backend.stats().allocations);
    assert_eq!(0, backend.stats().live());
}

#[test]
fn random_graphs_respect_dependencies() {
    let mut rng = StdRng::seed_from_u64(1234);

    for _ in 0..200 {
        let mut graph = Graph::new();
        let mut resources = Vec::new();

        for i in 0..rng.gen_range(1..6) {
            let handle = if rng.gen_bool(0.5) {
                import(&mut graph, &format!("imported{i}"))
            } else {
                graph.create_image(format!("transient{i}"), desc())
            };

            resources.push(handle);
        }

        let mut accesses = Vec::new();

        for i in 0..rng.gen_range(1..10) {
            let mut reads = Vec::new();
            let mut writes = Vec::new();

            for &handle in &resources {
                match rng.gen_range(0..4) {
                    0 => reads.push(handle),
                    1 => writes.push(handle),
                    _ => (),
                }
            }

            let mut builder = graph.add_pass(format!("pass{i}"));

            for &handle in &reads {
                builder.read(handle);
            }

            for &handle in &writes {
                builder.write(handle);
            }

            builder.pin();
            builder.execute(|_| Ok(()));

            accesses.push((reads, writes));
        }

        let lifetimes: Vec<_> = resources
            .iter()
            .map(|&handle| graph.lifetime(handle).unwrap())
            .collect();

        let target = match graph.compile() {
            Ok(target) => target,
            Err(Error::MissingWriter { .. } | Error::Cycle { .. }) => continue,
            Err(err) => panic!("unexpected error: {err}"),
        };

        let schedule = target.schedule();

        let position = |pass: usize| {
            let name = format!("pass{pass}");

            schedule
                .iter()
                .position(|scheduled| *scheduled == name)
                .unwrap()
        };

        for (resource_idx, &handle) in resources.iter().enumerate() {
            let mut writer = None;
            let mut pending = Vec::new();

            for (pass_idx, (reads, writes)) in accesses.iter().enumerate() {
                if reads.contains(&handle) {
                    match writer {
                        Some(writer) => {
                            assert!(position(writer) < position(pass_idx));
                        }
                        None if !lifetimes[resource_idx].is_external() => {
                            pending.push(pass_idx);
                        }
                        None => (),
                    }
                }

                if writes.contains(&handle) {
                    if let Some(writer) = writer {
                        assert!(position(writer) < position(pass_idx));
                    }

                    for reader in pending.drain(..) {
                        if reader != pass_idx {
                            assert!(position(pass_idx) < position(reader));
                        }
                    }

                    writer = Some(pass_idx);
                }
            }
        }
    }
}
