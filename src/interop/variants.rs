//! Kind-specific emission hooks.
//!
//! The base templates in [`super::marshaller`] call into this module for every
//! conversion step; dispatch is an explicit match over [`MarshallerKind`].
//! Kinds that need more than a conversion - the blittable fast path and safe
//! handles - override the whole argument sequence instead.
//!
//! Conventions shared by every hook:
//!
//! - Values move between the marshaller's two homes; a hook never touches
//!   argument slots directly except through a home or an explicit propagation.
//! - Pinned locals pin for the whole stub invocation (function-scoped), so no
//!   hook emits an unpin.
//! - Unmanaged allocations emit their release into the cleanup stream in the
//!   same hook family that allocated them.

use crate::{
    assembly::{HelperId, InstructionStream, Opcode},
    interop::{
        home::{emit_load_indirect, emit_store_indirect, Home},
        kind::{MarshalDirection, MarshallerKind},
        marshaller::{EmitContext, Marshaller},
        native::native_type_of,
        streams::Stream,
    },
    metadata::{NativeType, TypeSignature},
    Result,
};

// ---- full argument overrides ----------------------------------------------

/// Blittable fast path: by-value arguments are passed straight through; a
/// by-reference argument is pinned and its address passed as a native integer.
pub(super) fn emit_blittable_argument_forward(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
) -> Result<()> {
    if !m.is_managed_by_ref() {
        ctx.streams.callsite.ldarg(m.index() - 1);
        return Ok(());
    }

    let pinned = ctx
        .asm
        .alloc_pinned_local(TypeSignature::ByRef(Box::new(m.managed_type().clone())));
    let native_param = m.native_parameter_type()?;
    let native_local = ctx.asm.alloc_local(native_param.clone());
    m.set_native_home(Home::Local {
        id: native_local,
        signature: native_param,
    });

    ctx.streams
        .marshal
        .ldarg(m.index() - 1)
        .stloc(pinned)
        .ldloc(pinned)
        .conv_i()
        .stloc(native_local);
    ctx.streams.callsite.ldloc(native_local);
    Ok(())
}

/// SafeHandle argument: reference counting brackets the call, or a fresh
/// handle object is pre-allocated for the out-by-reference form.
pub(super) fn emit_safe_handle_argument_forward(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
) -> Result<()> {
    let handle_type = m.managed_type().clone();
    let native_local = ctx.asm.alloc_local(TypeSignature::I);
    m.set_native_home(Home::Local {
        id: native_local,
        signature: TypeSignature::I,
    });

    if m.is_managed_by_ref() {
        // Out-only: allocate the result handle before the call, so the raw
        // handle returned by the callee can never be lost to a failed
        // allocation afterwards.
        let handle_local = ctx.asm.alloc_local(handle_type.clone());
        m.set_managed_home(Home::Local {
            id: handle_local,
            signature: handle_type.clone(),
        });

        let ctor = ctx.asm.ctor_token(&handle_type);
        ctx.streams.marshal.newobj(ctor).stloc(handle_local);

        // The callee writes the raw handle into the native cell
        ctx.streams.callsite.ldloca(native_local);

        let set_handle = ctx.asm.helper_token(HelperId::SafeHandleSetHandle);
        let asm = &mut *ctx.asm;
        let s = &mut ctx.streams.unmarshal;
        s.ldloc(handle_local).ldloc(native_local).call(set_handle);
        s.ldarg(m.index() - 1).ldloc(handle_local);
        emit_store_indirect(s, asm, &handle_type);
        return Ok(());
    }

    m.set_managed_home(Home::Arg {
        index: m.index() - 1,
        signature: handle_type,
    });

    let tracker = ctx.asm.alloc_local(TypeSignature::Boolean);
    let add_ref = ctx.asm.helper_token(HelperId::SafeHandleDangerousAddRef);
    let get_handle = ctx.asm.helper_token(HelperId::SafeHandleDangerousGetHandle);
    let release = ctx.asm.helper_token(HelperId::SafeHandleDangerousRelease);
    let skip_release = ctx.asm.alloc_label();

    let s = &mut ctx.streams.marshal;
    s.ldc_i4(0).stloc(tracker);
    s.ldarg(m.index() - 1).ldloca(tracker).call(add_ref);
    s.ldarg(m.index() - 1).call(get_handle).stloc(native_local);

    ctx.streams.callsite.ldloc(native_local);

    // The release must run even when the native call throws; the cleanup
    // boundaries recorded on the stub keep this reachable from unwind.
    let u = &mut ctx.streams.unmarshal;
    u.ldloc(tracker).brfalse(skip_release);
    u.ldarg(m.index() - 1).call(release);
    u.mark(skip_release);
    Ok(())
}

// ---- protocol hooks --------------------------------------------------------

/// Allocates unmanaged resources and converts managed to native.
///
/// Allocation is folded into the kind-specific paths: the array path calls the
/// CoTaskMem helper, the ANSI path transcodes into a fresh managed buffer, the
/// rest convert in place.
pub(super) fn alloc_and_transform_managed_to_native(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    transform_managed_to_native(m, ctx, target)
}

/// Converts the value in the managed home into the native home.
pub(super) fn transform_managed_to_native(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    match m.kind() {
        MarshallerKind::VoidReturn => Ok(()),

        MarshallerKind::BlittableValue
        | MarshallerKind::Enum
        | MarshallerKind::UnicodeChar
        | MarshallerKind::BlittableStruct => {
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            nh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::AnsiChar => {
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            s.conv_u1();
            nh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::Bool => {
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            emit_bool_normalise(s);
            nh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::CBool => {
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            emit_bool_normalise(s);
            s.conv_u1();
            nh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::BlittableStructPtr => {
            let (mh, nh) = (m.managed_home(), m.native_home());
            let s = ctx.streams.get_mut(target);
            mh.emit_load_address(s);
            s.conv_u();
            nh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::UnicodeString => emit_unicode_string_pin(m, ctx, target),

        MarshallerKind::AnsiString => {
            // Transcode to a managed byte buffer, then pin it like a
            // blittable array; nothing here is CoTaskMem-allocated
            let to_ansi = ctx.asm.helper_token(HelperId::StringToAnsi);
            let buffer_type = TypeSignature::SzArray(Box::new(TypeSignature::U1));
            let buffer = ctx.asm.alloc_local(buffer_type.clone());
            let mh = m.managed_home();

            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            s.call(to_ansi).stloc(buffer);

            let source = Home::Local {
                id: buffer,
                signature: buffer_type,
            };
            emit_pin_first_element(m, ctx, &source, &TypeSignature::U1, target)
        }

        MarshallerKind::UnicodeStringBuilder => {
            let get_buffer = ctx.asm.helper_token(HelperId::GetEmptyStringBuilderBuffer);
            let buffer_type = TypeSignature::SzArray(Box::new(TypeSignature::Char));
            let buffer = ctx.asm.alloc_local(buffer_type.clone());
            let mh = m.managed_home();

            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            s.call(get_buffer).stloc(buffer);

            let source = Home::Local {
                id: buffer,
                signature: buffer_type,
            };
            emit_pin_first_element(m, ctx, &source, &TypeSignature::Char, target)
        }

        MarshallerKind::BlittableArray => {
            let element = m.managed_type().element_type()?.clone();
            let source = m.managed_home();
            emit_pin_first_element(m, ctx, &source, &element, target)
        }

        MarshallerKind::Array => emit_array_alloc_and_copy(m, ctx, target),

        MarshallerKind::FunctionPointer => {
            let get_stub = ctx.asm.helper_token(HelperId::GetStubForPInvokeDelegate);
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            s.call(get_stub);
            nh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::SafeHandle => {
            // Reverse return: the managed handle's raw value crosses back
            let get_handle = ctx.asm.helper_token(HelperId::SafeHandleDangerousGetHandle);
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            s.call(get_handle);
            nh.emit_store_value(s);
            Ok(())
        }

        kind => Err(unsupported_error!(
            "parameter {}: kind {:?} cannot be converted to native",
            m.index(),
            kind
        )),
    }
}

/// Converts the value in the native home back into the managed home.
pub(super) fn transform_native_to_managed(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    match m.kind() {
        MarshallerKind::VoidReturn => Ok(()),

        MarshallerKind::BlittableValue
        | MarshallerKind::Enum
        | MarshallerKind::BlittableStruct => {
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            nh.emit_load_value(s, asm);
            mh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::UnicodeChar | MarshallerKind::AnsiChar => {
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            nh.emit_load_value(s, asm);
            s.conv_u2();
            mh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::Bool | MarshallerKind::CBool => {
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            nh.emit_load_value(s, asm);
            emit_bool_normalise(s);
            mh.emit_store_value(s);
            Ok(())
        }

        // The callee writes through the passed pointer; the struct is
        // already up to date
        MarshallerKind::BlittableStructPtr => Ok(()),

        MarshallerKind::UnicodeString => {
            let ctor = ctx.asm.helper_token(HelperId::StringFromUnicodePtr);
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            nh.emit_load_value(s, asm);
            s.newobj(ctor);
            mh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::AnsiString => {
            let to_string = ctx.asm.helper_token(HelperId::AnsiStringToString);
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            nh.emit_load_value(s, asm);
            s.call(to_string);
            mh.emit_store_value(s);
            Ok(())
        }

        MarshallerKind::UnicodeStringBuilder => {
            let replace = ctx.asm.helper_token(HelperId::StringBuilderReplaceBuffer);
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            mh.emit_load_value(s, asm);
            nh.emit_load_value(s, asm);
            s.call(replace);
            Ok(())
        }

        MarshallerKind::Array => {
            if m.direction() == MarshalDirection::Reverse {
                emit_array_materialize_managed(m, ctx, target)?;
            }
            emit_array_copy_to_managed(m, ctx, target)
        }

        MarshallerKind::BlittableArray => {
            if m.direction() == MarshalDirection::Reverse {
                emit_array_materialize_managed(m, ctx, target)?;
                return emit_array_copy_to_managed(m, ctx, target);
            }
            if m.is_managed_by_ref() && !m.marshals_in() {
                // Out-only by-reference: nothing was pinned, fall back to the
                // general element copy out of the callee's buffer
                return emit_array_copy_to_managed(m, ctx, target);
            }
            // Pinned memory aliases the managed array; writes are already
            // visible
            Ok(())
        }

        MarshallerKind::SafeHandle => {
            let handle_type = m.managed_type().clone();
            let ctor = ctx.asm.ctor_token(&handle_type);
            let set_handle = ctx.asm.helper_token(HelperId::SafeHandleSetHandle);
            let (mh, nh) = (m.managed_home(), m.native_home());
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            s.newobj(ctor);
            mh.emit_store_value(s);
            mh.emit_load_value(s, asm);
            nh.emit_load_value(s, asm);
            s.call(set_handle);
            Ok(())
        }

        kind => Err(unsupported_error!(
            "parameter {}: kind {:?} cannot be converted back to managed",
            m.index(),
            kind
        )),
    }
}

/// Materialises the managed container for an out-only by-reference parameter
/// before its reverse transform runs.
pub(super) fn alloc_native_to_managed(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    match m.kind() {
        MarshallerKind::Array | MarshallerKind::BlittableArray => {
            emit_array_materialize_managed(m, ctx, target)
        }
        // Strings and handles materialise inside their transforms
        _ => Ok(()),
    }
}

/// Hook between the in- and out-conversions of an `[In, Out]` parameter.
///
/// No current kind needs to tear anything down here; the hook stays so the
/// template matches the emission protocol.
pub(super) fn clear_managed_transform(
    _m: &mut Marshaller,
    _ctx: &mut EmitContext,
    _target: Stream,
) {
}

/// Zeroes the native home of an out-only by-reference parameter instead of
/// converting the (absent) input value.
pub(super) fn reinit_native(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    let native = m.native_type()?;
    let home = m.native_home();
    let s = ctx.streams.get_mut(target);

    match native {
        TypeSignature::Ptr(_) | TypeSignature::I | TypeSignature::U | TypeSignature::FnPtr => {
            s.ldc_i4(0).conv_u();
        }
        TypeSignature::I8 | TypeSignature::U8 => {
            s.ldc_i4(0).emit(Opcode::ConvI8);
        }
        _ => {
            s.ldc_i4(0);
        }
    }
    home.emit_store_value(s);
    Ok(())
}

/// Releases unmanaged allocations on every exit path.
pub(super) fn emit_cleanup_forward(m: &mut Marshaller, ctx: &mut EmitContext) -> Result<()> {
    if m.kind() != MarshallerKind::Array || m.direction() != MarshalDirection::Forward {
        return Ok(());
    }

    let free = ctx.asm.helper_token(HelperId::CoTaskMemFree);
    let skip = ctx.asm.alloc_label();
    let nh = m.native_home();
    let asm = &mut *ctx.asm;
    let s = &mut ctx.streams.cleanup;
    nh.emit_load_value(s, asm);
    s.brfalse(skip);
    nh.emit_load_value(s, asm);
    s.call(free);
    s.mark(skip);
    Ok(())
}

// ---- shared emission helpers ----------------------------------------------

/// The `(x == 0) == 0` canonicalisation: collapses any non-zero value to 1.
fn emit_bool_normalise(stream: &mut InstructionStream) {
    stream.ldc_i4(0).ceq().ldc_i4(0).ceq();
}

/// Pins the managed string and passes a pointer to its first character,
/// branching over the data-offset add when the source is null.
fn emit_unicode_string_pin(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    let pinned = ctx.asm.alloc_pinned_local(TypeSignature::String);
    let offset = ctx.asm.helper_token(HelperId::OffsetToStringData);
    let null_source = ctx.asm.alloc_label();
    let (mh, nh) = (m.managed_home(), m.native_home());

    let asm = &mut *ctx.asm;
    let s = ctx.streams.get_mut(target);
    mh.emit_load_value(s, asm);
    s.stloc(pinned);
    s.ldloc(pinned).conv_i();
    s.dup().brfalse(null_source);
    s.call(offset).add();
    s.mark(null_source);
    nh.emit_store_value(s);
    Ok(())
}

/// Pins `source` (an array-typed home) and stores the address of its first
/// element into the native home; null or empty sources yield a null pointer.
fn emit_pin_first_element(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    source: &Home,
    element: &TypeSignature,
    target: Stream,
) -> Result<()> {
    let pinned = ctx
        .asm
        .alloc_pinned_local(TypeSignature::SzArray(Box::new(element.clone())));
    let done = ctx.asm.alloc_label();
    let element_token = ctx.asm.type_token(element);
    let nh = m.native_home();

    let asm = &mut *ctx.asm;
    let s = ctx.streams.get_mut(target);

    s.ldc_i4(0).conv_u();
    nh.emit_store_value(s);

    source.emit_load_value(s, asm);
    s.stloc(pinned);
    s.ldloc(pinned).brfalse(done);
    s.ldloc(pinned).ldlen().brfalse(done);
    s.ldloc(pinned).ldc_i4(0).ldelema(element_token).conv_u();
    nh.emit_store_value(s);
    s.mark(done);
    Ok(())
}

/// The managed element type, its native counterpart, and the descriptor
/// sub-type of an array marshaller.
fn element_types(
    m: &mut Marshaller,
) -> Result<(TypeSignature, TypeSignature, Option<NativeType>)> {
    let element_managed = m.managed_type().element_type()?.clone();
    let sub_type = m.descriptor().and_then(NativeType::array_sub_type).cloned();
    let element_native = native_type_of(
        m.element_kind(),
        MarshallerKind::Unknown,
        &element_managed,
        sub_type.as_ref(),
    )?;
    Ok((element_managed, element_native, sub_type))
}

/// Element kinds the general array loops can drive.
fn ensure_element_supported(m: &Marshaller) -> Result<()> {
    match m.element_kind() {
        MarshallerKind::BlittableValue
        | MarshallerKind::Enum
        | MarshallerKind::UnicodeChar
        | MarshallerKind::AnsiChar
        | MarshallerKind::Bool
        | MarshallerKind::CBool
        | MarshallerKind::BlittableStruct
        | MarshallerKind::FunctionPointer => Ok(()),
        kind => Err(unsupported_error!(
            "parameter {}: array element kind {:?} is not supported",
            m.index(),
            kind
        )),
    }
}

/// Allocates `count * sizeof(element)` zeroed unmanaged bytes and converts
/// every managed element into its slot. A null managed array yields a null
/// native pointer and skips the body entirely.
fn emit_array_alloc_and_copy(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    ensure_element_supported(m)?;
    let (element_managed, element_native, sub_type) = element_types(m)?;

    let count = ctx.asm.alloc_local(TypeSignature::I4);
    m.set_count_local(count);
    let index = ctx.asm.alloc_local(TypeSignature::I4);
    let done = ctx.asm.alloc_label();
    let body = ctx.asm.alloc_label();
    let condition = ctx.asm.alloc_label();
    let element_native_token = ctx.asm.type_token(&element_native);
    let element_managed_token = ctx.asm.type_token(&element_managed);
    let alloc = ctx.asm.helper_token(HelperId::CoTaskMemAllocAndZeroMemory);
    let (mh, nh) = (m.managed_home(), m.native_home());

    {
        let asm = &mut *ctx.asm;
        let s = ctx.streams.get_mut(target);

        s.ldc_i4(0).conv_u();
        nh.emit_store_value(s);

        mh.emit_load_value(s, asm);
        s.brfalse(done);

        mh.emit_load_value(s, asm);
        s.ldlen().conv_i4().stloc(count);

        s.ldloc(count).size_of(element_native_token).mul().conv_u();
        s.call(alloc);
        nh.emit_store_value(s);
    }

    if m.marshals_in() {
        let mut element = Marshaller::for_element(
            element_managed,
            m.element_kind(),
            sub_type,
            m.direction(),
        );

        {
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            s.ldc_i4(0).stloc(index).br(condition);
            s.mark(body);

            // Slot address first: the indirect store needs it below the value
            nh.emit_load_value(s, asm);
            s.ldloc(index).size_of(element_native_token).mul().add();

            mh.emit_load_value(s, asm);
            s.ldloc(index).ldelem(element_managed_token);
        }

        element.emit_element_forward(ctx, target)?;

        {
            let asm = &mut *ctx.asm;
            let s = ctx.streams.get_mut(target);
            emit_store_indirect(s, asm, &element_native);
            s.ldloc(index).ldc_i4(1).add().stloc(index);
            s.mark(condition);
            s.ldloc(index).ldloc(count).blt(body);
        }
    }

    ctx.streams.get_mut(target).mark(done);
    Ok(())
}

/// Computes the element count for the native-to-managed direction:
/// `SizeConst + value(SizeParamIndex)`, one of them alone when only one is
/// present, and 1 when neither is.
fn emit_reverse_count(m: &mut Marshaller, ctx: &mut EmitContext, target: Stream) -> Result<()> {
    let count = ctx.asm.alloc_local(TypeSignature::I4);
    let slot = m.size_param().clone();
    let s = ctx.streams.get_mut(target);

    #[allow(clippy::cast_possible_wrap)]
    match (slot.size_const, slot.param_slot) {
        (Some(size), Some((param, _))) => {
            s.ldc_i4(size as i32).ldarg(param).conv_i4().add();
        }
        (Some(size), None) => {
            s.ldc_i4(size as i32);
        }
        (None, Some((param, _))) => {
            s.ldarg(param).conv_i4();
        }
        (None, None) => {
            s.ldc_i4(1);
        }
    }
    s.stloc(count);
    m.set_count_local(count);
    Ok(())
}

/// Allocates the managed array an out-only or reverse parameter materialises
/// its elements into.
fn emit_array_materialize_managed(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    let element_managed = m.managed_type().element_type()?.clone();
    emit_reverse_count(m, ctx, target)?;
    let count = m
        .count_local()
        .expect("count local not allocated before materialisation");
    let element_token = ctx.asm.type_token(&element_managed);
    let mh = m.managed_home();

    let s = ctx.streams.get_mut(target);
    s.ldloc(count).newarr(element_token);
    mh.emit_store_value(s);
    Ok(())
}

/// Copies every native slot back into the managed array through the element
/// marshaller's reverse conversion.
fn emit_array_copy_to_managed(
    m: &mut Marshaller,
    ctx: &mut EmitContext,
    target: Stream,
) -> Result<()> {
    ensure_element_supported(m)?;
    if m.element_kind() == MarshallerKind::FunctionPointer {
        return Err(unsupported_error!(
            "parameter {}: function pointer elements cannot be converted back to delegates",
            m.index(),
        ));
    }
    let (element_managed, element_native, sub_type) = element_types(m)?;

    let count = m
        .count_local()
        .expect("count local not allocated before the copy-back loop");
    let index = ctx.asm.alloc_local(TypeSignature::I4);
    let done = ctx.asm.alloc_label();
    let body = ctx.asm.alloc_label();
    let condition = ctx.asm.alloc_label();
    let element_native_token = ctx.asm.type_token(&element_native);
    let element_managed_token = ctx.asm.type_token(&element_managed);
    let (mh, nh) = (m.managed_home(), m.native_home());

    let mut element = Marshaller::for_element(
        element_managed,
        m.element_kind(),
        sub_type,
        m.direction(),
    );

    {
        let asm = &mut *ctx.asm;
        let s = ctx.streams.get_mut(target);

        mh.emit_load_value(s, asm);
        s.brfalse(done);

        s.ldc_i4(0).stloc(index).br(condition);
        s.mark(body);

        mh.emit_load_value(s, asm);
        s.ldloc(index);

        nh.emit_load_value(s, asm);
        s.ldloc(index).size_of(element_native_token).mul().add();
        emit_load_indirect(s, asm, &element_native);
    }

    element.emit_element_reverse(ctx, target)?;

    {
        let s = ctx.streams.get_mut(target);
        s.stelem(element_managed_token);
        s.ldloc(index).ldc_i4(1).add().stloc(index);
        s.mark(condition);
        s.ldloc(index).ldloc(count).blt(body);
        s.mark(done);
    }
    Ok(())
}
