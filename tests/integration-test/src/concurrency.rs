#![cfg(test)]

use crate::host_bindless;
use bindless_draw_core::descriptor::{
	BindlessImageCreateInfo, BindlessImageUsage, BindlessSamplerCreateInfo, Extent, ResourceId, ResourceKind,
};
use std::collections::HashSet;
use std::thread;

const THREADS: usize = 4;
const SAMPLERS_PER_THREAD: usize = 64;
const IMAGES_PER_THREAD: usize = 16;

#[test]
fn test_concurrent_alloc() -> anyhow::Result<()> {
	let bindless = host_bindless()?;
	let ids = thread::scope(|s| {
		let handles = (0..THREADS)
			.map(|_| {
				s.spawn(|| -> anyhow::Result<Vec<ResourceId>> {
					let mut ids = Vec::new();
					for i in 0..SAMPLERS_PER_THREAD {
						ids.push(bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?);
						if i % (SAMPLERS_PER_THREAD / IMAGES_PER_THREAD) == 0 {
							ids.push(bindless.image().alloc(
								ResourceKind::SampledImage,
								&BindlessImageCreateInfo {
									extent: Extent::new_2d(1, 1),
									usage: BindlessImageUsage::SAMPLED,
									name: "concurrent",
									..BindlessImageCreateInfo::default()
								},
							)?);
						}
					}
					Ok(ids)
				})
			})
			.collect::<Vec<_>>();
		handles
			.into_iter()
			.map(|h| h.join().unwrap())
			.collect::<anyhow::Result<Vec<_>>>()
	})?
	.into_iter()
	.flatten()
	.collect::<Vec<_>>();

	assert_eq!(ids.len(), THREADS * (SAMPLERS_PER_THREAD + IMAGES_PER_THREAD));
	let unique = ids
		.iter()
		.map(|id| (id.kind().binding(), id.index()))
		.collect::<HashSet<_>>();
	assert_eq!(unique.len(), ids.len());

	bindless.flush();
	let frame = bindless.frame();
	for id in &ids {
		assert!(frame.get(*id).is_some(), "{:?} is not fetchable", id);
	}
	Ok(())
}

#[test]
fn test_unregister_while_fetching() -> anyhow::Result<()> {
	let bindless = host_bindless()?;
	let ids = (0..THREADS * SAMPLERS_PER_THREAD)
		.map(|_| bindless.sampler().alloc(&BindlessSamplerCreateInfo::linear()))
		.collect::<Result<Vec<_>, _>>()?;
	bindless.flush();
	let (retired, kept) = ids.split_at(ids.len() / 2);

	let frame = bindless.frame();
	thread::scope(|s| -> anyhow::Result<()> {
		let unregister = s.spawn(|| -> anyhow::Result<()> {
			for id in retired {
				bindless.unregister(*id)?;
			}
			Ok(())
		});
		let fetchers = (0..THREADS)
			.map(|_| {
				s.spawn(|| {
					let frame = bindless.frame();
					for _ in 0..8 {
						for id in kept {
							assert_eq!(
								frame.get_sampler(*id).map(|sampler| sampler.create_info),
								Some(BindlessSamplerCreateInfo::linear())
							);
						}
					}
				})
			})
			.collect::<Vec<_>>();
		for fetcher in fetchers {
			fetcher.join().unwrap();
		}
		unregister.join().unwrap()
	})?;

	for id in retired {
		assert!(frame.get_sampler(*id).is_none());
	}
	drop(frame);
	drop(bindless.frame());
	let reused = bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
	assert!(retired.iter().any(|id| id.index() == reused.index()));
	Ok(())
}
