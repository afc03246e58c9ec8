#![cfg(test)]

use crate::host_bindless;
use bindless_draw_core::backing::table::{SlotStatus, UnregisterError};
use bindless_draw_core::descriptor::{
	BindlessImageCreateInfo, BindlessImageUsage, BindlessSamplerCreateInfo, DescriptorTables, Extent, Format,
	ResourceKind, BINDING_SAMPLED_IMAGE, BINDING_SAMPLER, BINDING_STORAGE_IMAGE,
};
use bindless_draw_core::memory::{DeviceMemoryAlloc, HostMemory};
use bindless_draw_core::payload::{DrawPayloadBuilder, PayloadError, Vertex};
use bindless_draw_core::platform::host::HostEvent;

fn image_ci(name: &str, usage: BindlessImageUsage, format: Format) -> BindlessImageCreateInfo<'_> {
	BindlessImageCreateInfo {
		format,
		extent: Extent::new_2d(4, 4),
		usage,
		name,
		..BindlessImageCreateInfo::default()
	}
}

fn sampled(name: &str) -> BindlessImageCreateInfo<'_> {
	image_ci(name, BindlessImageUsage::SAMPLED, Format::R8G8B8A8_UNORM)
}

#[test]
fn test_kinds_do_not_alias() -> anyhow::Result<()> {
	let bindless = host_bindless()?;
	let float = bindless.image().alloc(ResourceKind::SampledImage, &sampled("float"))?;
	let uint = bindless.image().alloc(
		ResourceKind::UnsignedSampledImage,
		&image_ci("uint", BindlessImageUsage::SAMPLED, Format::R8G8B8A8_UINT),
	)?;
	let storage = bindless.image().alloc(
		ResourceKind::StorageImage,
		&image_ci("storage", BindlessImageUsage::STORAGE, Format::R8G8B8A8_UNORM),
	)?;
	let sampler = bindless.sampler().alloc(&BindlessSamplerCreateInfo::linear())?;

	// both sampled kinds share a table, storage images and samplers have their own
	assert_eq!((float.index().to_u32(), uint.index().to_u32()), (0, 1));
	assert_eq!(storage.index().to_u32(), 0);
	assert_eq!(sampler.index().to_u32(), 0);

	bindless.flush();
	let mut writes = bindless.platform.take_events();
	writes.sort_by_key(|e| match e {
		HostEvent::Write { binding, index } => (*binding, *index),
		_ => (u32::MAX, u32::MAX),
	});
	assert_eq!(
		writes,
		[
			HostEvent::Write {
				binding: BINDING_SAMPLED_IMAGE,
				index: 0
			},
			HostEvent::Write {
				binding: BINDING_SAMPLED_IMAGE,
				index: 1
			},
			HostEvent::Write {
				binding: BINDING_STORAGE_IMAGE,
				index: 0
			},
			HostEvent::Write {
				binding: BINDING_SAMPLER,
				index: 0
			},
		]
	);

	let frame = bindless.frame();
	let name = |kind, index| frame.fetch_image(kind, index).map(|i| i.debug_name().to_owned());
	assert_eq!(name(ResourceKind::SampledImage, float.index()), Some("float".to_owned()));
	assert_eq!(name(ResourceKind::UnsignedSampledImage, float.index()), None);
	assert_eq!(name(ResourceKind::UnsignedSampledImage, uint.index()), Some("uint".to_owned()));
	assert_eq!(name(ResourceKind::SampledImage, uint.index()), None);
	assert_eq!(name(ResourceKind::StorageImage, storage.index()), Some("storage".to_owned()));
	assert_eq!(name(ResourceKind::UnsignedStorageImage, storage.index()), None);
	assert!(frame.fetch_sampler(sampler.index()).is_some());

	assert!(frame.get(float).and_then(|r| r.image()).is_some());
	assert!(frame.get(sampler).and_then(|r| r.sampler()).is_some());
	Ok(())
}

#[test]
fn test_slot_reuse_bumps_version() -> anyhow::Result<()> {
	let bindless = host_bindless()?;
	let memory = HostMemory::new();
	let first = bindless.image().alloc(ResourceKind::SampledImage, &sampled("first"))?;
	let sampler = bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
	bindless.flush();
	bindless.platform.take_events();

	let vertices = memory.alloc_region("vertices", &[Vertex::default(); 3])?;
	let indices = memory.alloc_region("indices", &[0u32, 1, 2])?;
	let builder = |texture| DrawPayloadBuilder::new(vertices, indices).texture(texture).sampler(sampler);
	builder(first).build(&bindless.frame(), Some(&memory))?;

	// retired, but stays alive as long as a frame might still reference it
	let frame = bindless.frame();
	bindless.unregister(first)?;
	assert_eq!(bindless.slot_state(first).map(|s| s.status), Some(SlotStatus::Retired));
	assert_eq!(builder(first).build(&frame, Some(&memory)), Err(PayloadError::Unregistered(first)));
	drop(frame);
	drop(bindless.frame());
	assert_eq!(
		bindless.platform.take_events(),
		[HostEvent::Destroy {
			binding: BINDING_SAMPLED_IMAGE,
			index: first.index().to_u32()
		}]
	);
	assert_eq!(bindless.slot_state(first).map(|s| s.status), Some(SlotStatus::Free));

	let second = bindless.image().alloc(ResourceKind::SampledImage, &sampled("second"))?;
	assert_eq!(second.index(), first.index());
	assert_eq!(first.version().next(), Some(second.version()));
	bindless.flush();

	let frame = bindless.frame();
	assert!(frame.get_image(first).is_none());
	assert_eq!(frame.get_image(second).map(|i| i.debug_name()), Some("second"));
	assert_eq!(builder(first).build(&frame, Some(&memory)), Err(PayloadError::Stale(first)));
	let payload = builder(second).build(&frame, Some(&memory))?;
	assert_eq!(payload.resolve_texture(&frame)?.debug_name(), "second");
	assert_eq!(bindless.unregister(first), Err(UnregisterError::Stale(first)));
	Ok(())
}

#[test]
fn test_unflushed_retire() -> anyhow::Result<()> {
	let bindless = host_bindless()?;
	let sampler = bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
	bindless.unregister(sampler)?;
	bindless.flush();
	// never written, so never visible
	assert!(bindless.platform.take_events().is_empty());
	assert!(bindless.frame().get_sampler(sampler).is_none());
	Ok(())
}

#[test]
fn test_wrong_kind() -> anyhow::Result<()> {
	let bindless = host_bindless()?;
	let memory = HostMemory::new();
	let uint = bindless.image().alloc(
		ResourceKind::UnsignedSampledImage,
		&image_ci("uint", BindlessImageUsage::SAMPLED, Format::R8G8B8A8_UINT),
	)?;
	let sampler = bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
	bindless.flush();

	let vertices = memory.alloc_region("vertices", &[Vertex::default(); 3])?;
	let indices = memory.alloc_region("indices", &[0u32, 1, 2])?;
	let frame = bindless.frame();
	assert_eq!(
		DrawPayloadBuilder::new(vertices, indices)
			.texture(uint)
			.sampler(sampler)
			.build(&frame, Some(&memory)),
		Err(PayloadError::WrongKind {
			id: uint,
			expected: ResourceKind::SampledImage
		})
	);
	assert_eq!(
		DrawPayloadBuilder::new(vertices, indices)
			.texture(sampler)
			.sampler(sampler)
			.build(&frame, Some(&memory)),
		Err(PayloadError::WrongKind {
			id: sampler,
			expected: ResourceKind::SampledImage
		})
	);
	Ok(())
}
