//! The marshaller entity and its base emission protocol.
//!
//! One [`Marshaller`] exists per parameter of a stub (plus one for the return
//! slot). It is constructed by classifying the parameter, lives for the
//! duration of emission, and is discarded with the stub. Emission follows a
//! fixed template per role and direction; the kind-specific conversions are the
//! hook implementations in [`super::variants`], selected by an explicit match
//! over [`MarshallerKind`].
//!
//! # Forward-argument template
//!
//! For a managed caller invoking a native callee, each argument runs through:
//!
//! 1. **Home setup** - bind the managed home (argument slot, or a fresh local
//!    for by-reference parameters) and allocate a native local.
//! 2. **In-propagation** - dereference a by-reference argument into its local.
//! 3. **Marshal** - allocate/convert managed to native, or zero the native
//!    home when the parameter is out-only.
//! 4. **Call site** - push the native value (or its address when the native
//!    side is by-reference).
//! 5. **Unmarshal** - convert back for `out` parameters and propagate through
//!    the by-reference argument, address first.
//! 6. **Cleanup** - release unmanaged allocations; the cleanup stream stays
//!    reachable from exceptional unwind.
//!
//! The reverse-argument template mirrors this with the native side in argument
//! slots. Return values run entirely in the return-value stream: the raw call
//! result is parked in the native home, converted, and the managed result is
//! the last load of the stub.

use crate::{
    assembly::{LocalId, StubAssembler},
    interop::{
        home::{emit_load_indirect, emit_store_indirect, Home},
        kind::{classify, resolve_in_out, MarshalDirection, MarshallerKind, MarshallerRole},
        native::{native_param_type, native_type_of},
        streams::{CodeStreams, Stream},
        variants,
    },
    metadata::{MarshalPolicy, NativeType, SignatureMethod, TypeSignature},
    Result,
};

/// Shared emission state: the assembler and stream bundle of the stub being
/// generated.
pub(crate) struct EmitContext<'a> {
    /// Vendor of locals, labels, and tokens
    pub asm: &'a mut StubAssembler,
    /// The five code streams
    pub streams: &'a mut CodeStreams,
}

/// Element-count source for an array parameter, resolved at construction.
///
/// `SizeParamIndex` lookups across sibling parameters happen here, while the
/// whole parameter list is at hand; emission later only needs the argument
/// slot and its type.
#[derive(Debug, Clone, Default)]
pub(crate) struct SizeParamSlot {
    /// Constant element count (`SizeConst`)
    pub size_const: Option<u32>,
    /// Argument slot and type of the count-carrying parameter
    pub param_slot: Option<(u16, TypeSignature)>,
}

/// Marshals one parameter (or the return value) of an interop stub.
#[derive(Debug)]
pub struct Marshaller {
    kind: MarshallerKind,
    element_kind: MarshallerKind,
    role: MarshallerRole,
    direction: MarshalDirection,
    /// 1-based parameter ordinal; 0 is the return slot
    index: u16,
    managed_type: TypeSignature,
    managed_param_type: TypeSignature,
    is_managed_by_ref: bool,
    is_native_by_ref: bool,
    marshal_in: bool,
    marshal_out: bool,
    is_return: bool,
    optional: bool,
    descriptor: Option<NativeType>,
    native_type: Option<TypeSignature>,
    size_param: SizeParamSlot,
    managed_home: Option<Home>,
    native_home: Option<Home>,
    /// Element count local shared between the marshal and unmarshal loops
    count_local: Option<LocalId>,
}

impl Marshaller {
    /// Builds the marshaller for one parameter of `signature`.
    ///
    /// `ordinal` is 1-based; 0 builds the return-value marshaller.
    ///
    /// # Errors
    ///
    /// [`crate::Error::UnsupportedSignature`] when classification yields
    /// `Invalid`, and [`crate::Error::InvalidSizeParamIndex`] when an array
    /// descriptor's size parameter is out of range or non-integral.
    pub fn for_parameter(
        signature: &SignatureMethod,
        ordinal: u16,
        policy: &MarshalPolicy,
        direction: MarshalDirection,
    ) -> Result<Marshaller> {
        let Some(parameter) = signature.parameter(ordinal) else {
            return Err(malformed_error!("No parameter with ordinal {}", ordinal));
        };

        let is_return = ordinal == 0;
        let managed_type = parameter.base.clone();
        let managed_param_type = parameter.signature_type();
        let descriptor = parameter.marshal.clone();

        let (kind, element_kind) = classify(
            &managed_type,
            descriptor.as_ref(),
            policy,
            MarshallerRole::Argument,
            is_return,
        );
        if kind == MarshallerKind::Invalid {
            return Err(unsupported_error!(
                "parameter {}: {:?} with descriptor {:?} has no marshalling strategy",
                ordinal,
                managed_type,
                descriptor
            ));
        }
        debug_assert!(kind != MarshallerKind::Unknown);

        let (marshal_in, marshal_out) = resolve_in_out(
            kind,
            &managed_type,
            parameter,
            parameter.by_ref,
            is_return,
        );
        let size_param = resolve_size_param(signature, descriptor.as_ref(), kind)?;

        Ok(Marshaller {
            kind,
            element_kind,
            role: MarshallerRole::Argument,
            direction,
            index: ordinal,
            managed_type,
            managed_param_type,
            is_managed_by_ref: parameter.by_ref,
            is_native_by_ref: parameter.by_ref,
            marshal_in,
            marshal_out,
            is_return,
            optional: parameter.is_optional(),
            descriptor,
            native_type: None,
            size_param,
            managed_home: None,
            native_home: None,
            count_local: None,
        })
    }

    /// Builds the marshaller for one array element.
    ///
    /// Element marshallers convert a value already on the evaluation stack and
    /// leave the converted value on the stack; both homes are locals.
    pub(crate) fn for_element(
        element_type: TypeSignature,
        element_kind: MarshallerKind,
        descriptor: Option<NativeType>,
        direction: MarshalDirection,
    ) -> Marshaller {
        Marshaller {
            kind: element_kind,
            element_kind: MarshallerKind::Unknown,
            role: MarshallerRole::Element,
            direction,
            index: 0,
            managed_param_type: element_type.clone(),
            managed_type: element_type,
            is_managed_by_ref: false,
            is_native_by_ref: false,
            marshal_in: true,
            marshal_out: false,
            is_return: false,
            optional: false,
            descriptor,
            native_type: None,
            size_param: SizeParamSlot::default(),
            managed_home: None,
            native_home: None,
            count_local: None,
        }
    }

    /// The strategy this marshaller emits with.
    #[must_use]
    pub fn kind(&self) -> MarshallerKind {
        self.kind
    }

    /// The element strategy, for array kinds.
    #[must_use]
    pub fn element_kind(&self) -> MarshallerKind {
        self.element_kind
    }

    /// The role this marshaller plays.
    #[must_use]
    pub fn role(&self) -> MarshallerRole {
        self.role
    }

    /// True for the return-value marshaller.
    #[must_use]
    pub fn is_return(&self) -> bool {
        self.is_return
    }

    /// Effective `in` semantics after resolution.
    #[must_use]
    pub fn marshals_in(&self) -> bool {
        self.marshal_in
    }

    /// Effective `out` semantics after resolution.
    #[must_use]
    pub fn marshals_out(&self) -> bool {
        self.marshal_out
    }

    /// True when the parameter is optional.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// The by-ref-stripped managed type.
    #[must_use]
    pub fn managed_type(&self) -> &TypeSignature {
        &self.managed_type
    }

    pub(crate) fn direction(&self) -> MarshalDirection {
        self.direction
    }

    pub(crate) fn is_managed_by_ref(&self) -> bool {
        self.is_managed_by_ref
    }

    pub(crate) fn index(&self) -> u16 {
        self.index
    }

    pub(crate) fn descriptor(&self) -> Option<&NativeType> {
        self.descriptor.as_ref()
    }

    pub(crate) fn size_param(&self) -> &SizeParamSlot {
        &self.size_param
    }

    pub(crate) fn count_local(&self) -> Option<LocalId> {
        self.count_local
    }

    pub(crate) fn set_count_local(&mut self, local: LocalId) {
        self.count_local = Some(local);
    }

    /// The native representation of the value (lazily computed).
    pub(crate) fn native_type(&mut self) -> Result<TypeSignature> {
        if let Some(native) = &self.native_type {
            return Ok(native.clone());
        }

        let native = native_type_of(
            self.kind,
            self.element_kind,
            &self.managed_type,
            self.descriptor.as_ref(),
        )?;
        self.native_type = Some(native.clone());
        Ok(native)
    }

    /// The native type of the parameter slot (pointer-wrapped when by-ref).
    pub(crate) fn native_parameter_type(&mut self) -> Result<TypeSignature> {
        let native = self.native_type()?;
        Ok(native_param_type(native, self.is_native_by_ref))
    }

    /// The managed home. Homes exist once setup ran; asking earlier is an
    /// internal invariant violation.
    pub(crate) fn managed_home(&self) -> Home {
        self.managed_home.clone().expect("managed home not set up")
    }

    pub(crate) fn native_home(&self) -> Home {
        self.native_home.clone().expect("native home not set up")
    }

    pub(crate) fn set_native_home(&mut self, home: Home) {
        self.native_home = Some(home);
    }

    pub(crate) fn set_managed_home(&mut self, home: Home) {
        self.managed_home = Some(home);
    }

    /// Drives this marshaller's emission for its role and direction.
    pub(crate) fn emit_marshalling(&mut self, ctx: &mut EmitContext) -> Result<()> {
        debug_assert_eq!(self.role, MarshallerRole::Argument);
        self.ensure_supported()?;

        match self.direction {
            MarshalDirection::Forward => {
                if self.is_return {
                    self.emit_marshal_return_value_managed_to_native(ctx)
                } else {
                    self.emit_marshal_argument_managed_to_native(ctx)
                }
            }
            MarshalDirection::Reverse => {
                if self.is_return {
                    self.emit_marshal_return_value_native_to_managed(ctx)
                } else {
                    self.emit_marshal_argument_native_to_managed(ctx)
                }
            }
        }
    }

    /// Rejects classified kinds that have no emitter, and direction/flag
    /// combinations outside the supported surface.
    fn ensure_supported(&self) -> Result<()> {
        debug_assert!(!matches!(
            self.kind,
            MarshallerKind::Unknown | MarshallerKind::Invalid
        ));

        if matches!(
            self.kind,
            MarshallerKind::Decimal
                | MarshallerKind::Guid
                | MarshallerKind::OleDateTime
                | MarshallerKind::Struct
                | MarshallerKind::HandleRef
                | MarshallerKind::CriticalHandle
                | MarshallerKind::Variant
                | MarshallerKind::Object
                | MarshallerKind::AnsiStringBuilder
                | MarshallerKind::AnsiCharArray
                | MarshallerKind::ByValArray
                | MarshallerKind::ByValAnsiCharArray
        ) {
            return Err(unsupported_error!(
                "parameter {}: no emitter for kind {:?}",
                self.index,
                self.kind
            ));
        }

        if self.direction == MarshalDirection::Reverse {
            if self.kind == MarshallerKind::FunctionPointer {
                return Err(unsupported_error!(
                    "parameter {}: function pointers cannot be marshalled back to delegates",
                    self.index
                ));
            }
            if self.kind == MarshallerKind::UnicodeStringBuilder {
                return Err(unsupported_error!(
                    "parameter {}: string builders are not supported in reverse stubs",
                    self.index
                ));
            }
            if matches!(
                self.kind,
                MarshallerKind::AnsiString | MarshallerKind::UnicodeString
            ) && (self.marshal_out || self.is_managed_by_ref)
            {
                return Err(unsupported_error!(
                    "parameter {}: strings in reverse stubs are in-only",
                    self.index
                ));
            }
            if self.kind.is_array() && (self.marshal_out || !self.marshal_in) {
                return Err(unsupported_error!(
                    "parameter {}: arrays in reverse stubs are in-only",
                    self.index
                ));
            }
        }

        if self.kind == MarshallerKind::FunctionPointer
            && (self.is_managed_by_ref || self.marshal_out)
        {
            return Err(unsupported_error!(
                "parameter {}: delegates cannot be marshalled out",
                self.index
            ));
        }

        if self.kind == MarshallerKind::UnicodeStringBuilder && self.is_return {
            return Err(unsupported_error!(
                "string builders cannot be marshalled as return values"
            ));
        }

        if self.kind == MarshallerKind::SafeHandle && self.is_managed_by_ref {
            if self.marshal_in && self.marshal_out {
                return Err(unsupported_error!(
                    "parameter {}: [In, Out] by-reference SafeHandle is not supported",
                    self.index
                ));
            }
            if self.marshal_in || !self.marshal_out {
                return Err(unsupported_error!(
                    "parameter {}: by-reference SafeHandle must be [Out]",
                    self.index
                ));
            }
        }

        Ok(())
    }

    // ---- forward direction -------------------------------------------------

    fn emit_marshal_argument_managed_to_native(&mut self, ctx: &mut EmitContext) -> Result<()> {
        match self.kind {
            MarshallerKind::BlittableValue => variants::emit_blittable_argument_forward(self, ctx),
            MarshallerKind::SafeHandle => variants::emit_safe_handle_argument_forward(self, ctx),
            _ => self.emit_forward_argument_template(ctx),
        }
    }

    /// The default forward-argument emission sequence (see module docs).
    pub(crate) fn emit_forward_argument_template(&mut self, ctx: &mut EmitContext) -> Result<()> {
        self.setup_forward_argument_homes(ctx)?;

        if self.is_managed_by_ref && self.marshal_in {
            self.propagate_managed_in(ctx);
        }

        if self.is_managed_by_ref && !self.marshal_in {
            variants::reinit_native(self, ctx, Stream::Marshal)?;
        } else {
            variants::alloc_and_transform_managed_to_native(self, ctx, Stream::Marshal)?;
        }

        self.emit_callsite_argument(ctx);

        if self.marshal_out {
            if self.marshal_in {
                variants::clear_managed_transform(self, ctx, Stream::Unmarshal);
            }
            if self.is_managed_by_ref && !self.marshal_in {
                variants::alloc_native_to_managed(self, ctx, Stream::Unmarshal)?;
            }
            variants::transform_native_to_managed(self, ctx, Stream::Unmarshal)?;
            if self.is_managed_by_ref {
                self.propagate_managed_out(ctx);
            }
        }

        variants::emit_cleanup_forward(self, ctx)?;
        Ok(())
    }

    fn emit_marshal_return_value_managed_to_native(
        &mut self,
        ctx: &mut EmitContext,
    ) -> Result<()> {
        if self.kind == MarshallerKind::VoidReturn {
            return Ok(());
        }

        self.setup_return_homes(ctx)?;

        // The raw native result sits on the stack when this stream runs
        self.native_home().emit_store_value(&mut ctx.streams.retval);
        variants::transform_native_to_managed(self, ctx, Stream::Retval)?;
        self.managed_home()
            .emit_load_value(&mut ctx.streams.retval, ctx.asm);
        Ok(())
    }

    // ---- reverse direction -------------------------------------------------

    fn emit_marshal_argument_native_to_managed(&mut self, ctx: &mut EmitContext) -> Result<()> {
        // Blittable pass-through needs no homes at all
        if self.kind == MarshallerKind::BlittableValue
            && !self.is_managed_by_ref
            && !self.marshal_out
        {
            ctx.streams.callsite.ldarg(self.index - 1);
            return Ok(());
        }

        self.setup_reverse_argument_homes(ctx)?;

        if self.is_native_by_ref && self.marshal_in {
            self.propagate_native_in(ctx)?;
        }

        if self.marshal_in || !self.is_native_by_ref {
            variants::transform_native_to_managed(self, ctx, Stream::Marshal)?;
        }

        // Call site pushes the managed argument for the managed callee
        let managed_home = self.managed_home();
        if self.is_managed_by_ref {
            managed_home.emit_load_address(&mut ctx.streams.callsite);
        } else {
            managed_home.emit_load_value(&mut ctx.streams.callsite, ctx.asm);
        }

        if self.marshal_out {
            variants::transform_managed_to_native(self, ctx, Stream::Unmarshal)?;
            if self.is_native_by_ref {
                self.propagate_native_out(ctx)?;
            }
        }

        Ok(())
    }

    fn emit_marshal_return_value_native_to_managed(
        &mut self,
        ctx: &mut EmitContext,
    ) -> Result<()> {
        if self.kind == MarshallerKind::VoidReturn {
            return Ok(());
        }

        self.setup_return_homes(ctx)?;

        // The managed result sits on the stack when this stream runs
        self.managed_home().emit_store_value(&mut ctx.streams.retval);
        variants::transform_managed_to_native(self, ctx, Stream::Retval)?;
        self.native_home()
            .emit_load_value(&mut ctx.streams.retval, ctx.asm);
        Ok(())
    }

    // ---- home setup --------------------------------------------------------

    /// Binds the managed home and allocates the native local for a forward
    /// argument. Homes are created lazily on the first setup call and are
    /// stable afterwards.
    fn setup_forward_argument_homes(&mut self, ctx: &mut EmitContext) -> Result<()> {
        if self.managed_home.is_some() {
            return Ok(());
        }

        let managed_home = if self.is_managed_by_ref {
            // Indirect stores need the address below the value, so converted
            // values are parked in a direct local and propagated explicitly.
            let id = ctx.asm.alloc_local(self.managed_type.clone());
            Home::Local {
                id,
                signature: self.managed_type.clone(),
            }
        } else {
            Home::Arg {
                index: self.index - 1,
                signature: self.managed_param_type.clone(),
            }
        };

        let native = self.native_type()?;
        let native_home = Home::Local {
            id: ctx.asm.alloc_local(native.clone()),
            signature: native,
        };

        self.managed_home = Some(managed_home);
        self.native_home = Some(native_home);
        Ok(())
    }

    /// Mirror of the forward setup: the native side binds to the argument slot.
    fn setup_reverse_argument_homes(&mut self, ctx: &mut EmitContext) -> Result<()> {
        if self.managed_home.is_some() {
            return Ok(());
        }

        let native = self.native_type()?;
        let native_home = if self.is_native_by_ref {
            let id = ctx.asm.alloc_local(native.clone());
            Home::Local {
                id,
                signature: native,
            }
        } else {
            Home::Arg {
                index: self.index - 1,
                signature: native,
            }
        };

        let managed_home = Home::Local {
            id: ctx.asm.alloc_local(self.managed_type.clone()),
            signature: self.managed_type.clone(),
        };

        self.managed_home = Some(managed_home);
        self.native_home = Some(native_home);
        Ok(())
    }

    /// Return values convert between two locals in the return-value stream.
    fn setup_return_homes(&mut self, ctx: &mut EmitContext) -> Result<()> {
        if self.managed_home.is_some() {
            return Ok(());
        }

        let managed_home = Home::Local {
            id: ctx.asm.alloc_local(self.managed_type.clone()),
            signature: self.managed_type.clone(),
        };
        let native = self.native_type()?;
        let native_home = Home::Local {
            id: ctx.asm.alloc_local(native.clone()),
            signature: native,
        };

        self.managed_home = Some(managed_home);
        self.native_home = Some(native_home);
        Ok(())
    }

    /// Both element homes are locals; the element value arrives on the stack.
    pub(crate) fn setup_element_homes(&mut self, ctx: &mut EmitContext) -> Result<()> {
        if self.managed_home.is_some() {
            return Ok(());
        }

        self.setup_return_homes(ctx)
    }

    // ---- propagation -------------------------------------------------------

    /// Dereferences the by-reference managed argument into the managed local.
    fn propagate_managed_in(&mut self, ctx: &mut EmitContext) {
        let managed_type = self.managed_type.clone();
        let home = self.managed_home();
        let stream = &mut ctx.streams.marshal;
        stream.ldarg(self.index - 1);
        emit_load_indirect(stream, ctx.asm, &managed_type);
        home.emit_store_value(stream);
    }

    /// Writes the managed local back through the by-reference argument,
    /// address first.
    fn propagate_managed_out(&mut self, ctx: &mut EmitContext) {
        let managed_type = self.managed_type.clone();
        let home = self.managed_home();
        let stream = &mut ctx.streams.unmarshal;
        stream.ldarg(self.index - 1);
        home.emit_load_value(stream, ctx.asm);
        emit_store_indirect(stream, ctx.asm, &managed_type);
    }

    /// Dereferences the by-reference native argument into the native local.
    fn propagate_native_in(&mut self, ctx: &mut EmitContext) -> Result<()> {
        let native = self.native_type()?;
        let home = self.native_home();
        let stream = &mut ctx.streams.marshal;
        stream.ldarg(self.index - 1);
        emit_load_indirect(stream, ctx.asm, &native);
        home.emit_store_value(stream);
        Ok(())
    }

    /// Writes the native local back through the by-reference pointer.
    fn propagate_native_out(&mut self, ctx: &mut EmitContext) -> Result<()> {
        let native = self.native_type()?;
        let home = self.native_home();
        let stream = &mut ctx.streams.unmarshal;
        stream.ldarg(self.index - 1);
        home.emit_load_value(stream, ctx.asm);
        emit_store_indirect(stream, ctx.asm, &native);
        Ok(())
    }

    // ---- call site ---------------------------------------------------------

    /// Pushes this argument for the native call: the native value, or its
    /// address when the native side is by-reference.
    fn emit_callsite_argument(&mut self, ctx: &mut EmitContext) {
        let home = self.native_home();
        if self.is_native_by_ref {
            home.emit_load_address(&mut ctx.streams.callsite);
        } else {
            home.emit_load_value(&mut ctx.streams.callsite, ctx.asm);
        }
    }

    // ---- elements ----------------------------------------------------------

    /// Converts the managed element value on the stack, leaving the native
    /// value on the stack.
    pub(crate) fn emit_element_forward(
        &mut self,
        ctx: &mut EmitContext,
        target: Stream,
    ) -> Result<()> {
        self.setup_element_homes(ctx)?;
        self.managed_home()
            .emit_store_value(ctx.streams.get_mut(target));
        variants::transform_managed_to_native(self, ctx, target)?;
        let home = self.native_home();
        home.emit_load_value(ctx.streams.get_mut(target), ctx.asm);
        Ok(())
    }

    /// Converts the native element value on the stack, leaving the managed
    /// value on the stack.
    pub(crate) fn emit_element_reverse(
        &mut self,
        ctx: &mut EmitContext,
        target: Stream,
    ) -> Result<()> {
        self.setup_element_homes(ctx)?;
        self.native_home()
            .emit_store_value(ctx.streams.get_mut(target));
        variants::transform_native_to_managed(self, ctx, target)?;
        let home = self.managed_home();
        home.emit_load_value(ctx.streams.get_mut(target), ctx.asm);
        Ok(())
    }
}

/// Resolves the element-count source of an array parameter against the
/// sibling parameter list.
fn resolve_size_param(
    signature: &SignatureMethod,
    descriptor: Option<&NativeType>,
    kind: MarshallerKind,
) -> Result<SizeParamSlot> {
    if !kind.is_array() {
        return Ok(SizeParamSlot::default());
    }

    let (num_param, num_element) = match descriptor {
        Some(NativeType::Array {
            num_param,
            num_element,
            ..
        }) => (*num_param, *num_element),
        Some(NativeType::FixedArray { size, .. }) => (None, Some(*size)),
        _ => (None, None),
    };

    let param_slot = match num_param {
        None => None,
        Some(index) => {
            // The index is offset by one against ordinals to skip the
            // return-value slot
            let Some(target) = usize::try_from(index)
                .ok()
                .and_then(|i| signature.params.get(i))
            else {
                return Err(crate::Error::InvalidSizeParamIndex {
                    index,
                    message: "index points outside the parameter list",
                });
            };
            if !target.base.is_integral() {
                return Err(crate::Error::InvalidSizeParamIndex {
                    index,
                    message: "size parameter is not an integral type",
                });
            }
            let slot = u16::try_from(index).map_err(|_| crate::Error::InvalidSizeParamIndex {
                index,
                message: "index points outside the parameter list",
            })?;
            Some((slot, target.base.clone()))
        }
    };

    Ok(SizeParamSlot {
        size_const: num_element,
        param_slot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{SignatureParameter, Token};

    fn array_method(marshal: NativeType) -> SignatureMethod {
        SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![
                SignatureParameter::new(TypeSignature::SzArray(Box::new(TypeSignature::I4)))
                    .with_marshal(marshal),
                SignatureParameter::new(TypeSignature::I4),
            ],
        )
    }

    #[test]
    fn test_construction_classifies() {
        let method = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![SignatureParameter::new(TypeSignature::String)],
        );
        let marshaller = Marshaller::for_parameter(
            &method,
            1,
            &MarshalPolicy::auto(),
            MarshalDirection::Forward,
        )
        .unwrap();

        assert_eq!(marshaller.kind(), MarshallerKind::UnicodeString);
        assert!(marshaller.marshals_in());
        assert!(!marshaller.marshals_out());
        assert!(!marshaller.is_return());
    }

    #[test]
    fn test_construction_rejects_invalid() {
        let method = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![SignatureParameter::new(TypeSignature::Object).with_marshal(NativeType::I4)],
        );
        let result = Marshaller::for_parameter(
            &method,
            1,
            &MarshalPolicy::auto(),
            MarshalDirection::Forward,
        );
        assert!(matches!(
            result.unwrap_err(),
            crate::Error::UnsupportedSignature(_)
        ));
    }

    #[test]
    fn test_size_param_resolution() {
        let method = array_method(NativeType::Array {
            element_type: Box::new(NativeType::End),
            num_param: Some(1),
            num_element: Some(4),
        });
        let marshaller = Marshaller::for_parameter(
            &method,
            1,
            &MarshalPolicy::auto(),
            MarshalDirection::Forward,
        )
        .unwrap();

        let slot = marshaller.size_param();
        assert_eq!(slot.size_const, Some(4));
        assert_eq!(slot.param_slot, Some((1, TypeSignature::I4)));
    }

    #[test]
    fn test_size_param_out_of_range() {
        let method = array_method(NativeType::Array {
            element_type: Box::new(NativeType::End),
            num_param: Some(7),
            num_element: None,
        });
        let result = Marshaller::for_parameter(
            &method,
            1,
            &MarshalPolicy::auto(),
            MarshalDirection::Forward,
        );
        assert!(matches!(
            result.unwrap_err(),
            crate::Error::InvalidSizeParamIndex { index: 7, .. }
        ));
    }

    #[test]
    fn test_size_param_non_integral() {
        let method = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![
                SignatureParameter::new(TypeSignature::SzArray(Box::new(TypeSignature::I4)))
                    .with_marshal(NativeType::Array {
                        element_type: Box::new(NativeType::End),
                        num_param: Some(1),
                        num_element: None,
                    }),
                SignatureParameter::new(TypeSignature::String),
            ],
        );
        let result = Marshaller::for_parameter(
            &method,
            1,
            &MarshalPolicy::auto(),
            MarshalDirection::Forward,
        );
        assert!(matches!(
            result.unwrap_err(),
            crate::Error::InvalidSizeParamIndex { index: 1, .. }
        ));
    }

    #[test]
    fn test_native_types_are_memoised() {
        let method = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![SignatureParameter::by_ref(TypeSignature::Boolean)],
        );
        let mut marshaller = Marshaller::for_parameter(
            &method,
            1,
            &MarshalPolicy::auto(),
            MarshalDirection::Forward,
        )
        .unwrap();

        assert_eq!(marshaller.native_type().unwrap(), TypeSignature::I4);
        assert_eq!(
            marshaller.native_parameter_type().unwrap(),
            TypeSignature::I4.pointer_to()
        );
    }

    #[test]
    fn test_safe_handle_flag_rules() {
        let handle = TypeSignature::SafeHandle(Token::new(0x02000001));

        // Plain by-ref defaults to [In, Out], which is rejected
        let method = SignatureMethod::pinvoke(
            SignatureParameter::returning(TypeSignature::Void),
            vec![SignatureParameter::by_ref(handle.clone())],
        );
        let mut marshaller = Marshaller::for_parameter(
            &method,
            1,
            &MarshalPolicy::auto(),
            MarshalDirection::Forward,
        )
        .unwrap();
        let mut asm = StubAssembler::new();
        let mut streams = CodeStreams::new();
        let mut ctx = EmitContext {
            asm: &mut asm,
            streams: &mut streams,
        };
        assert!(marshaller.emit_marshalling(&mut ctx).is_err());
    }
}
